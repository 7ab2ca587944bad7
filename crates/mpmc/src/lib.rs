//! Bounded multi-producer multi-consumer queue of audit work items.
//!
//! Ring-decomposed: every producer token gets a dedicated SPSC ring shard,
//! eliminating producer-producer contention. Consumers claim shards one at a
//! time so concurrent consumer threads never read the same shard twice.
//!
//! # Key features
//!
//! - 128-byte alignment (prefetcher false-sharing elimination)
//! - Batch enqueue/dequeue with a single atomic tail/head update per batch
//! - Adaptive backoff for non-blocking callers (spin → yield), plus a
//!   millisecond-scale exponential backoff with jitter for blocking calls
//! - Zero-copy reserve/commit API via `MaybeUninit`
//!
//! # Example
//!
//! ```
//! use auditlog_mpmc::Queue;
//! use std::time::Duration;
//!
//! let queue = Queue::<u64>::new(1024, 4);
//! let producer = queue.producer_token().unwrap();
//! let consumer = queue.consumer_token();
//!
//! producer.enqueue(42).unwrap();
//! producer.enqueue_blocking(43, Duration::from_millis(10)).unwrap();
//!
//! let mut out = Vec::new();
//! consumer.dequeue_batch(&mut out, 10);
//! assert_eq!(out, vec![42, 43]);
//! ```

mod backoff;
mod config;
mod error;
pub(crate) mod invariants;
mod metrics;
mod queue;
mod reservation;
mod ring;

pub use backoff::{Backoff, BlockingBackoff};
pub use config::Config;
pub use error::QueueError;
pub use metrics::{Metrics, MetricsSnapshot};
pub use queue::{ConsumerToken, ProducerToken, Queue};
pub use reservation::Reservation;
pub use ring::Ring;
