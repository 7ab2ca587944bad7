use thiserror::Error;

/// Error types for [`crate::Queue`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Too many producer tokens minted (exceeds `max_producer_tokens`).
    #[error("too many producer tokens registered (max: {max})")]
    TooManyProducers {
        /// The configured maximum number of producer tokens.
        max: usize,
    },
    /// The queue is closed; no further items will be accepted.
    #[error("queue is closed")]
    Closed,
    /// The producer's shard is full (non-blocking `enqueue` only).
    #[error("queue shard is full")]
    Full,
    /// `enqueue_blocking`/`enqueue_batch_blocking` exhausted its timeout.
    #[error("enqueue timed out")]
    Timeout,
}
