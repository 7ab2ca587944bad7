use std::io;
use std::path::PathBuf;

/// Failure modes surfaced by the FD cache and the retry wrapper.
///
/// Mirrors the transient-vs-fatal split the storage layer needs: a
/// transient error means the retry wrapper already exhausted its
/// attempts, a fatal one means the underlying OS error is not the kind
/// retrying would fix (permission denied, no such directory, ...).
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("open {path:?} failed after {attempts} attempts: {source}")]
    OpenExhausted {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("fsync {path:?} failed after {attempts} attempts: {source}")]
    FsyncExhausted {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: io::Error,
    },

    #[error("write at offset {offset} into {path:?} failed: {source}")]
    Write {
        path: PathBuf,
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type BackendResult<T> = Result<T, BackendError>;
