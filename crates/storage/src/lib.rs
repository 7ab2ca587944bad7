//! Segmented, per-destination append-only storage.
//!
//! Builds the stream/segment/rotation model on top of
//! `auditlog-storage-backend`'s FD cache and retry primitives, and owns
//! the entry/batch wire format plus the compression and encryption
//! transforms applied to framed batches before they reach disk.

pub mod codec;
pub mod entry;
pub mod error;
pub mod framing;
pub mod segment;
pub mod storage;
pub mod stream;
pub mod transform;

pub use codec::{deserialize_batch, deserialize_entry, serialize_batch, serialize_entry, CodecError};
pub use entry::{Action, Batch, Destination, Entry};
pub use error::{StorageError, StorageResult};
pub use framing::{
    frame_encrypted, frame_plain, FramePayload, FrameReader, FramingError, GCM_IV_LEN, GCM_TAG_LEN,
};
pub use storage::{Storage, StorageConfig};
pub use transform::{AesGcmEncryptor, Compressor, Encryptor, TransformError, ZlibCompressor};
