use crate::invariants::{
    debug_assert_bounded_count, debug_assert_head_not_past_tail, debug_assert_initialized_read,
    debug_assert_monotonic, debug_assert_no_wrap,
};
use crate::{Backoff, Config, Metrics, Reservation};
use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// Each shard is single-producer, with a dedicated owning producer and an
// exclusive-at-a-time consumer (see `claimed`, below).
//
// ## Sequence Numbers (ABA Prevention)
//
// `head`/`tail` are unbounded u64 sequence numbers rather than wrapped
// indices; the buffer index is `sequence & mask`. Wrap-around of the u64
// space itself is not reachable in practice.
//
// ## Memory Ordering Protocol
//
// Producer: load `tail` Relaxed, consult the cached head, write into the
// buffer, then publish with a Release store to `tail`.
//
// Consumer: load `head` Relaxed, consult the tail via an Acquire load, read
// from the buffer, then publish with a Release store to `head`.
//
// ## Single-Writer Invariants
//
// `cached_head`/`buffer[idx]` are accessed through `UnsafeCell` without
// atomics because each has exactly one writer at a time: the producer owns
// `cached_head` and the write window ahead of `tail`; the consumer that
// currently holds the `claimed` flag owns the read window behind `head`.
//
// =============================================================================

/// A shard is single-producer but may be drained by any one of several
/// consumer threads over its lifetime (never two at once -- see `claimed`).
#[repr(C)]
pub struct Ring<T> {
    // === PRODUCER HOT === (128-byte aligned)
    tail: CacheAligned<AtomicU64>,
    cached_head: CacheAligned<UnsafeCell<u64>>,

    // === CONSUMER HOT === (128-byte aligned)
    head: CacheAligned<AtomicU64>,

    // === COLD STATE ===
    active: CacheAligned<AtomicBool>,
    closed: AtomicBool,
    /// Exclusive drain claim: `compare_exchange`'d by whichever consumer
    /// token is currently draining this shard, so concurrent consumer
    /// threads never read the same shard at once.
    claimed: AtomicBool,
    metrics: Metrics,
    config: Config,

    buffer: UnsafeCell<Box<[MaybeUninit<T>]>>,
}

unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T> Ring<T> {
    pub fn new(config: Config) -> Self {
        let capacity = config.shard_capacity();
        let mut buffer = Vec::with_capacity(capacity);
        buffer.resize_with(capacity, MaybeUninit::uninit);
        let buffer = buffer.into_boxed_slice();

        Self {
            tail: CacheAligned::new(AtomicU64::new(0)),
            cached_head: CacheAligned::new(UnsafeCell::new(0)),
            head: CacheAligned::new(AtomicU64::new(0)),
            active: CacheAligned::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
            claimed: AtomicBool::new(false),
            metrics: Metrics::new(),
            config,
            buffer: UnsafeCell::new(buffer),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.config.shard_capacity()
    }

    #[inline]
    fn mask(&self) -> usize {
        self.config.mask()
    }

    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        tail.wrapping_sub(head) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tail.load(Ordering::Relaxed) == self.head.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    // ---------------------------------------------------------------------
    // PRODUCER API
    // ---------------------------------------------------------------------

    /// Reserves exactly `n` slots, split across the wrap boundary if needed.
    /// Returns `None` if there isn't room for all `n`, or the shard is
    /// closed. Unlike a single contiguous slice, the caller never has to
    /// retry to fill a partial reservation -- the whole batch reserves (and
    /// later commits) atomically.
    #[allow(clippy::cast_possible_truncation)]
    pub fn reserve(&self, n: usize) -> Option<Reservation<'_, T>> {
        if n == 0 || n > self.capacity() {
            return None;
        }
        if self.is_closed() {
            return None;
        }

        let tail = self.tail.load(Ordering::Relaxed);

        // Fast path: cached head.
        // SAFETY: only the producer writes `cached_head`.
        let cached_head = unsafe { *self.cached_head.get() };
        let space = self
            .capacity()
            .saturating_sub(tail.wrapping_sub(cached_head) as usize);

        if space >= n {
            return Some(self.make_reservation(tail, n));
        }

        // Slow path: refresh the cache.
        let head = self.head.load(Ordering::Acquire);
        unsafe {
            *self.cached_head.get() = head;
        }

        let space = self.capacity().saturating_sub(tail.wrapping_sub(head) as usize);
        if space < n {
            return None;
        }

        Some(self.make_reservation(tail, n))
    }

    /// Reserve with adaptive spin/yield backoff. Spins, yields, then gives up.
    pub fn reserve_with_backoff(&self, n: usize) -> Option<Reservation<'_, T>> {
        let mut backoff = Backoff::new();
        let mut spins = 0u64;
        while !backoff.is_completed() {
            if let Some(r) = self.reserve(n) {
                if self.config.enable_metrics && spins > 0 {
                    self.metrics.add_reserve_spins(spins);
                }
                return Some(r);
            }
            if self.is_closed() {
                return None;
            }
            backoff.snooze();
            spins += 1;
        }
        if self.config.enable_metrics {
            self.metrics.add_reserve_spins(spins);
        }
        None
    }

    fn make_reservation(&self, tail: u64, n: usize) -> Reservation<'_, T> {
        let mask = self.mask();
        let idx = (tail as usize) & mask;
        let first = n.min(self.capacity() - idx);
        let second = n - first;

        // SAFETY: [tail, tail+n) is beyond the consumer's current head (we
        // just verified `space >= n`), so the producer has exclusive write
        // access to these slots until it publishes via `commit_internal`.
        let (head_slice, tail_slice) = unsafe {
            let buffer = &mut *self.buffer.get();
            let (a, b) = buffer.split_at_mut(idx);
            let head_part = &mut b[..first];
            let tail_part = if second > 0 { &mut a[..second] } else { &mut [] };
            (
                std::slice::from_raw_parts_mut(head_part.as_mut_ptr(), first),
                std::slice::from_raw_parts_mut(tail_part.as_mut_ptr(), second),
            )
        };

        Reservation::new(head_slice, tail_slice, self as *const Self)
    }

    pub(crate) fn commit_internal(&self, n: usize) {
        let tail = self.tail.load(Ordering::Relaxed);
        let new_tail = tail.wrapping_add(n as u64);
        let head = self.head.load(Ordering::Relaxed);

        debug_assert_bounded_count!(new_tail.wrapping_sub(head) as usize, self.capacity());
        debug_assert_monotonic!("tail", tail, new_tail);
        debug_assert_no_wrap!("tail", tail, new_tail);

        self.tail.store(new_tail, Ordering::Release);

        if self.config.enable_metrics {
            self.metrics.add_messages_sent(n as u64);
            self.metrics.add_batches_sent(1);
        }
    }

    /// Convenience single-item push.
    #[inline]
    pub fn push(&self, item: T) -> bool {
        self.reserve(1).is_some_and(|mut r| {
            r.write(0, item);
            r.commit();
            true
        })
    }

    // ---------------------------------------------------------------------
    // CONSUMER CLAIM (mutual exclusion across consumer threads)
    // ---------------------------------------------------------------------

    /// Attempts to take exclusive drain rights over this shard. On success,
    /// the caller must call `release_claim` when done (a small guard does
    /// this for you -- see `queue::ClaimGuard`).
    #[inline]
    pub(crate) fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    #[inline]
    pub(crate) fn release_claim(&self) {
        self.claimed.store(false, Ordering::Release);
    }

    // ---------------------------------------------------------------------
    // CONSUMER API (caller must hold the claim)
    // ---------------------------------------------------------------------

    /// Drains up to `max_items` into `handler`, transferring ownership, with
    /// a single head update for the whole batch. Returns the count consumed.
    #[allow(clippy::cast_possible_truncation)]
    pub fn consume_up_to_owned<F>(&self, max_items: usize, mut handler: F) -> usize
    where
        F: FnMut(T),
    {
        if max_items == 0 {
            return 0;
        }

        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);

        let avail = tail.wrapping_sub(head) as usize;
        if avail == 0 {
            return 0;
        }

        let to_consume = avail.min(max_items);
        let mask = self.mask();
        let mut pos = head;
        let mut count = 0;

        while count < to_consume {
            debug_assert_initialized_read!(pos, head, tail);
            let idx = (pos as usize) & mask;
            // SAFETY: [head, tail) was published by the producer via a
            // Release store on `tail`, synchronized by the Acquire load
            // above; only the claim-holding consumer reads these slots.
            let item = unsafe {
                let buffer = &*self.buffer.get();
                buffer[idx].assume_init_read()
            };
            handler(item);
            pos = pos.wrapping_add(1);
            count += 1;
        }

        debug_assert_head_not_past_tail!(head.wrapping_add(count as u64), tail);
        debug_assert_monotonic!("head", head, head.wrapping_add(count as u64));
        self.head
            .store(head.wrapping_add(count as u64), Ordering::Release);

        if self.config.enable_metrics {
            self.metrics.add_messages_received(count as u64);
            self.metrics.add_batches_received(1);
        }

        count
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn metrics(&self) -> crate::MetricsSnapshot {
        if self.config.enable_metrics {
            self.metrics.snapshot()
        } else {
            crate::MetricsSnapshot::default()
        }
    }
}

impl<T> Drop for Ring<T> {
    fn drop(&mut self) {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        let count = tail.wrapping_sub(head) as usize;

        if count > 0 {
            let mask = self.mask();
            let buffer = self.buffer.get_mut();

            for i in 0..count {
                let idx = ((head as usize).wrapping_add(i)) & mask;
                unsafe {
                    ptr::drop_in_place(buffer[idx].as_mut_ptr());
                }
            }
        }
    }
}

/// Wrapper type that ensures 128-byte alignment to prevent prefetcher-induced
/// false sharing on Intel/AMD CPUs.
#[repr(align(128))]
struct CacheAligned<T> {
    value: T,
}

impl<T> CacheAligned<T> {
    const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> std::ops::Deref for CacheAligned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_basic_reserve_commit() {
        let ring = Ring::<u64>::new(Config::default());

        if let Some(mut r) = ring.reserve(4) {
            r.write(0, 100);
            r.write(1, 200);
            r.write(2, 300);
            r.write(3, 400);
            r.commit();
        }

        assert_eq!(ring.len(), 4);

        let mut sum = 0u64;
        let consumed = ring.consume_up_to_owned(10, |item| sum += item);
        assert_eq!(consumed, 4);
        assert_eq!(sum, 1000);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_ring_full() {
        let config = Config::new(4, 16, false); // 16 slots
        let ring = Ring::<u64>::new(config);

        for i in 0..16 {
            assert!(ring.push(i));
        }
        assert!(ring.reserve(1).is_none());
    }

    #[test]
    fn test_batch_reservation_wraps_atomically() {
        let config = Config::new(4, 16, false); // 16 slots
        let ring = Ring::<u64>::new(config);

        // Fill to near the end, drain, then reserve a batch that wraps.
        for i in 0..14 {
            assert!(ring.push(i));
        }
        let mut drained = 0;
        ring.consume_up_to_owned(14, |_| drained += 1);
        assert_eq!(drained, 14);

        // tail is now at 14; reserving 4 items wraps around index 16.
        let mut r = ring.reserve(4).unwrap();
        assert!(r.is_split());
        assert_eq!(r.len(), 4);
        for i in 0..4u64 {
            r.write(i as usize, i * 10);
        }
        r.commit();

        let mut out = Vec::new();
        let n = ring.consume_up_to_owned(10, |v| out.push(v));
        assert_eq!(n, 4);
        assert_eq!(out, vec![0, 10, 20, 30]);
    }

    #[test]
    fn test_claim_mutual_exclusion() {
        let ring = Ring::<u64>::new(Config::default());
        assert!(ring.try_claim());
        assert!(!ring.try_claim());
        ring.release_claim();
        assert!(ring.try_claim());
    }

    #[test]
    fn test_consume_up_to_drops_items() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        static DROP_COUNT: AtomicUsize = AtomicUsize::new(0);

        struct DropTracker;
        impl Drop for DropTracker {
            fn drop(&mut self) {
                DROP_COUNT.fetch_add(1, Ordering::SeqCst);
            }
        }

        DROP_COUNT.store(0, Ordering::SeqCst);
        let ring = Ring::<DropTracker>::new(Config::default());

        for _ in 0..5 {
            assert!(ring.push(DropTracker));
        }
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 0);

        let consumed = ring.consume_up_to_owned(5, |_item| {});
        assert_eq!(consumed, 5);
        assert_eq!(DROP_COUNT.load(Ordering::SeqCst), 5);
    }
}
