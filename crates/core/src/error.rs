use auditlog_mpmc::QueueError;
use auditlog_storage::StorageError;
use thiserror::Error;

use crate::config::ConfigError;

/// Producer-visible errors from `append`/`append_batch`.
#[derive(Debug, Error)]
pub enum AppendError {
    #[error("manager is not accepting entries")]
    NotAccepting,
    #[error("enqueue timed out")]
    QueueTimeout,
}

impl From<QueueError> for AppendError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Timeout => AppendError::QueueTimeout,
            QueueError::Closed | QueueError::Full | QueueError::TooManyProducers { .. } => {
                AppendError::NotAccepting
            }
        }
    }
}

/// Top-level error type spanning config, queue, and storage failures.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Append(#[from] AppendError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("manager is already started")]
    AlreadyStarted,
    #[error("manager was never started")]
    NotStarted,
    #[error("config enables encryption but no crypto key was supplied")]
    MissingCryptoKey,
}
