use std::path::PathBuf;

use auditlog_storage_backend::BackendError;

use crate::codec::CodecError;
use crate::framing::FramingError;
use crate::transform::TransformError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("transient storage I/O error, retries exhausted: {0}")]
    IoTransient(#[from] BackendError),

    #[error("fatal storage I/O error on {path:?}: {source}")]
    IoFatal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    #[error("transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
