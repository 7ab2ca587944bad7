//! Drains the queue, groups dequeued work by destination, and pushes each
//! group through serialize -> compress -> encrypt -> storage.write.
//!
//! Grouped the way a sequential batch processor groups spans by trace_id
//! before flush: a plain `HashMap`, drained and partitioned on the writer
//! thread itself, with no shared mutable state between buckets. Metrics
//! are plain per-thread counters behind a `Mutex` that only gets touched
//! once per drained batch, not per entry, mirroring the split between
//! cheap sequential counters and cross-thread aggregation used elsewhere
//! in this codebase.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use auditlog_mpmc::{ConsumerToken, Queue};
use auditlog_storage::{
    frame_encrypted, frame_plain, serialize_batch, AesGcmEncryptor, Batch, Compressor, Destination,
    Encryptor, Storage, StorageError, ZlibCompressor,
};
use rand::RngCore;
use tracing::{debug, warn};

use crate::config::Config;
use crate::work_item::WorkItem;

const IDLE_SLEEP: Duration = Duration::from_millis(2);

#[derive(Debug, Default, Clone, Copy)]
pub struct WriterMetrics {
    pub batches_drained: u64,
    pub buckets_written: u64,
    pub bucket_errors: u64,
    pub bytes_written: u64,
}

impl std::ops::AddAssign for WriterMetrics {
    fn add_assign(&mut self, other: Self) {
        self.batches_drained += other.batches_drained;
        self.buckets_written += other.buckets_written;
        self.bucket_errors += other.bucket_errors;
        self.bytes_written += other.bytes_written;
    }
}

/// Key + transform selection shared read-only by every writer thread.
pub struct CryptoConfig {
    pub key: [u8; 32],
}

struct WriterContext {
    storage: Arc<Storage>,
    compressor: Arc<dyn Compressor>,
    encryptor: Arc<dyn Encryptor>,
    crypto: Option<CryptoConfig>,
    compression_level: u32,
}

fn process_bucket(
    destination: &Destination,
    batch: &Batch,
    ctx: &WriterContext,
) -> Result<u64, StorageError> {
    let serialized = serialize_batch(batch);

    let transformed = if ctx.compression_level > 0 {
        ctx.compressor.compress(ctx.compression_level, &serialized)?
    } else {
        serialized
    };

    let framed = if let Some(crypto) = &ctx.crypto {
        let mut iv = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut iv);
        let ciphertext_and_tag = ctx.encryptor.encrypt(&crypto.key, &iv, &transformed)?;
        frame_encrypted(&iv, &ciphertext_and_tag)
    } else {
        frame_plain(&transformed)
    };

    ctx.storage.write_to(destination, &framed)?;
    Ok(framed.len() as u64)
}

fn writer_loop(
    consumer: ConsumerToken<WorkItem>,
    ctx: WriterContext,
    batch_size: usize,
    stopping: Arc<AtomicBool>,
    metrics: Arc<Mutex<WriterMetrics>>,
) {
    let mut buf: Vec<WorkItem> = Vec::with_capacity(batch_size);
    loop {
        buf.clear();
        let got = consumer.dequeue_batch(&mut buf, batch_size);
        if got == 0 {
            if stopping.load(Ordering::Acquire) {
                break;
            }
            thread::sleep(IDLE_SLEEP);
            continue;
        }

        debug!(count = got, "writer drained batch");
        metrics.lock().unwrap().batches_drained += 1;

        let mut buckets: HashMap<Destination, Vec<_>> = HashMap::new();
        for item in buf.drain(..) {
            buckets.entry(item.destination).or_default().push(item.entry);
        }

        for (destination, entries) in buckets {
            let batch = Batch::new(entries);
            match process_bucket(&destination, &batch, &ctx) {
                Ok(bytes) => {
                    let mut m = metrics.lock().unwrap();
                    m.buckets_written += 1;
                    m.bytes_written += bytes;
                }
                Err(e) => {
                    warn!(destination = destination.as_str(), error = %e, "bucket write failed, dropping bucket");
                    metrics.lock().unwrap().bucket_errors += 1;
                }
            }
        }
    }
}

struct WriterHandle {
    metrics: Arc<Mutex<WriterMetrics>>,
    join: JoinHandle<()>,
}

/// A fixed-size pool of writer threads draining a shared queue.
pub struct WriterPool {
    handles: Vec<WriterHandle>,
    stopping: Arc<AtomicBool>,
}

impl WriterPool {
    pub fn start(config: &Config, queue: &Queue<WorkItem>, storage: Arc<Storage>, crypto: Option<CryptoConfig>) -> Self {
        let stopping = Arc::new(AtomicBool::new(false));
        let crypto = Arc::new(crypto);
        let mut handles = Vec::with_capacity(config.num_writer_threads);

        for _ in 0..config.num_writer_threads {
            let consumer = queue.consumer_token();
            let metrics = Arc::new(Mutex::new(WriterMetrics::default()));
            let thread_metrics = Arc::clone(&metrics);
            let thread_stopping = Arc::clone(&stopping);
            let ctx = WriterContext {
                storage: Arc::clone(&storage),
                compressor: Arc::new(ZlibCompressor),
                encryptor: Arc::new(AesGcmEncryptor),
                crypto: crypto.as_ref().clone(),
                compression_level: config.compression_level,
            };
            let batch_size = config.batch_size;

            let join = thread::spawn(move || {
                writer_loop(consumer, ctx, batch_size, thread_stopping, thread_metrics);
            });
            handles.push(WriterHandle { metrics, join });
        }

        Self { handles, stopping }
    }

    /// Signals every writer thread to drain-and-stop, then joins them.
    pub fn stop(self) {
        self.stopping.store(true, Ordering::Release);
        for handle in self.handles {
            let _ = handle.join.join();
        }
    }

    pub fn aggregate_metrics(&self) -> WriterMetrics {
        let mut total = WriterMetrics::default();
        for handle in &self.handles {
            total += *handle.metrics.lock().unwrap();
        }
        total
    }
}

impl Clone for CryptoConfig {
    fn clone(&self) -> Self {
        Self { key: self.key }
    }
}
