use crate::{BlockingBackoff, Config, QueueError, Ring};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Bounded multi-producer multi-consumer queue, built from per-producer ring
/// shards (ring decomposition): every producer token gets its own dedicated
/// SPSC ring, so producers never contend with each other. Consumers drain
/// shards round-robin, claiming one at a time so two consumer threads never
/// read the same shard concurrently.
pub struct Queue<T> {
    inner: Arc<QueueInner<T>>,
}

struct QueueInner<T> {
    rings: Vec<Ring<T>>,
    producer_count: AtomicUsize,
    closed: AtomicBool,
    config: Config,
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Queue<T> {
    /// Creates a queue with room for roughly `capacity` items spread across
    /// `max_producer_tokens` shards.
    pub fn new(capacity: usize, max_producer_tokens: usize) -> Self {
        let config = Config::for_total_capacity(capacity, max_producer_tokens);
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Self {
        let rings = (0..config.max_producer_tokens)
            .map(|_| Ring::new(config))
            .collect();

        Self {
            inner: Arc::new(QueueInner {
                rings,
                producer_count: AtomicUsize::new(0),
                closed: AtomicBool::new(false),
                config,
            }),
        }
    }

    /// Mints a dedicated producer token bound to its own ring shard.
    pub fn producer_token(&self) -> Result<ProducerToken<T>, QueueError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }

        let id = self.inner.producer_count.fetch_add(1, Ordering::SeqCst);
        if id >= self.inner.config.max_producer_tokens {
            self.inner.producer_count.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueError::TooManyProducers {
                max: self.inner.config.max_producer_tokens,
            });
        }

        self.inner.rings[id].set_active(true);

        Ok(ProducerToken {
            queue: Arc::clone(&self.inner),
            shard: id,
        })
    }

    /// Mints a consumer token that round-robins over every producer shard,
    /// starting from a distinct offset so concurrently minted consumers
    /// don't all start contending on shard 0.
    pub fn consumer_token(&self) -> ConsumerToken<T> {
        let shard_count = self.inner.rings.len().max(1);
        let start = self.inner.producer_count.load(Ordering::Relaxed) % shard_count;
        ConsumerToken {
            queue: Arc::clone(&self.inner),
            cursor: Cell::new(start),
        }
    }

    /// Approximate, monotonic-eventual total item count across all shards.
    pub fn size(&self) -> usize {
        self.inner.rings.iter().map(Ring::len).sum()
    }

    /// Blocks (via short sleeps) until the queue is observed empty.
    pub fn flush(&self) {
        while self.size() > 0 {
            std::thread::sleep(Duration::from_micros(100));
        }
    }

    /// Closes the queue: no further enqueues are accepted. Already-enqueued
    /// items remain dequeueable.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
        for ring in &self.inner.rings {
            ring.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn metrics(&self) -> crate::MetricsSnapshot {
        let mut total = crate::MetricsSnapshot::default();
        for ring in &self.inner.rings {
            total += ring.metrics();
        }
        total
    }
}

/// Per-producer-thread handle bound to a dedicated ring shard.
pub struct ProducerToken<T> {
    queue: Arc<QueueInner<T>>,
    shard: usize,
}

impl<T> ProducerToken<T> {
    #[inline]
    fn ring(&self) -> &Ring<T> {
        &self.queue.rings[self.shard]
    }

    /// Non-blocking try-enqueue of a single item.
    pub fn enqueue(&self, item: T) -> Result<(), QueueError> {
        if self.queue.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }
        match self.ring().reserve(1) {
            Some(mut r) => {
                r.write(0, item);
                r.commit();
                Ok(())
            }
            None => Err(QueueError::Full),
        }
    }

    /// Retries with exponential backoff + jitter until the item is accepted
    /// or `timeout` elapses.
    pub fn enqueue_blocking(&self, item: T, timeout: Duration) -> Result<(), QueueError> {
        if self.queue.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }

        let mut item = Some(item);
        let mut backoff = BlockingBackoff::new(timeout);
        loop {
            if self.queue.closed.load(Ordering::Acquire) {
                return Err(QueueError::Closed);
            }
            if let Some(mut r) = self.ring().reserve(1) {
                r.write(0, item.take().expect("item consumed exactly once"));
                r.commit();
                return Ok(());
            }
            if !backoff.sleep_step() {
                return Err(QueueError::Timeout);
            }
        }
    }

    /// All-or-nothing batch enqueue: on each attempt, either the whole batch
    /// reserves as a single atomic unit or nothing is enqueued. Retries with
    /// backoff until it fits or `timeout` elapses.
    pub fn enqueue_batch_blocking(
        &self,
        items: Vec<T>,
        timeout: Duration,
    ) -> Result<(), QueueError> {
        if items.is_empty() {
            return Ok(());
        }
        if self.queue.closed.load(Ordering::Acquire) {
            return Err(QueueError::Closed);
        }

        let n = items.len();
        let mut items = items.into_iter();
        let mut backoff = BlockingBackoff::new(timeout);

        loop {
            if self.queue.closed.load(Ordering::Acquire) {
                return Err(QueueError::Closed);
            }
            if let Some(mut r) = self.ring().reserve(n) {
                for (i, item) in items.by_ref().enumerate() {
                    r.write(i, item);
                }
                r.commit();
                return Ok(());
            }
            if !backoff.sleep_step() {
                return Err(QueueError::Timeout);
            }
        }
    }
}

/// Per-consumer-thread handle that round-robins over every producer shard.
pub struct ConsumerToken<T> {
    queue: Arc<QueueInner<T>>,
    cursor: Cell<usize>,
}

impl<T> ConsumerToken<T> {
    /// Non-blocking try-dequeue of a single item.
    pub fn dequeue(&self) -> Option<T> {
        let mut out = Vec::with_capacity(1);
        self.dequeue_batch(&mut out, 1);
        out.pop()
    }

    /// Drains up to `max` items into `out` (appended), scanning shards
    /// starting from this token's round-robin cursor. Returns the number of
    /// items moved; may be zero even if the queue is non-empty (another
    /// consumer may hold the claim on the only non-empty shard right now).
    pub fn dequeue_batch(&self, out: &mut Vec<T>, max: usize) -> usize {
        let rings = &self.queue.rings;
        let shard_count = rings.len();
        if shard_count == 0 || max == 0 {
            return 0;
        }

        let mut moved = 0;
        let start = self.cursor.get() % shard_count;

        for offset in 0..shard_count {
            if moved >= max {
                break;
            }
            let idx = (start + offset) % shard_count;
            let ring = &rings[idx];

            if !ring.try_claim() {
                continue;
            }
            let want = max - moved;
            let got = ring.consume_up_to_owned(want, |item| out.push(item));
            ring.release_claim();
            moved += got;
        }

        self.cursor.set((start + 1) % shard_count);
        moved
    }

    /// Dequeues repeatedly with a short sleep between empty polls, for a
    /// writer's idle loop. Returns once at least one item is drained or
    /// `deadline` passes.
    pub fn dequeue_batch_wait(&self, out: &mut Vec<T>, max: usize, deadline: Instant) -> usize {
        loop {
            let got = self.dequeue_batch(out, max);
            if got > 0 || Instant::now() >= deadline {
                return got;
            }
            std::thread::sleep(Duration::from_micros(200));
        }
    }
}
