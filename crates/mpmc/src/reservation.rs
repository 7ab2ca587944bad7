use crate::ring::Ring;
use std::mem::MaybeUninit;

/// Zero-copy reservation for writing directly into a ring shard.
///
/// Unlike a single contiguous slice, a reservation may straddle the end of
/// the ring buffer: `tail` always covers exactly the number of slots asked
/// for (never fewer), split into a head part and, if it wrapped, a tail
/// part. This lets a multi-item batch commit as a single atomic tail
/// publish instead of one publish per contiguous chunk, which is what makes
/// `enqueue_batch_blocking` atomic with respect to concurrent dequeues.
///
/// # Example
///
/// ```ignore
/// if let Some(mut r) = ring.reserve(3) {
///     for (i, slot) in r.iter_mut().enumerate() {
///         slot.write(i as u64);
///     }
///     r.commit();
/// }
/// ```
pub struct Reservation<'a, T> {
    head: &'a mut [MaybeUninit<T>],
    tail: &'a mut [MaybeUninit<T>],
    ring_ptr: *const Ring<T>,
    len: usize,
}

impl<'a, T> Reservation<'a, T> {
    pub(crate) fn new(
        head: &'a mut [MaybeUninit<T>],
        tail: &'a mut [MaybeUninit<T>],
        ring_ptr: *const Ring<T>,
    ) -> Self {
        let len = head.len() + tail.len();
        Self {
            head,
            tail,
            ring_ptr,
            len,
        }
    }

    /// Number of reserved slots. Always equal to the `n` passed to `reserve(n)`.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True if the reservation wraps across the end of the ring buffer.
    #[inline]
    pub fn is_split(&self) -> bool {
        !self.tail.is_empty()
    }

    /// Iterates mutably over every reserved slot in logical order, whether or
    /// not the reservation wraps.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut MaybeUninit<T>> {
        self.head.iter_mut().chain(self.tail.iter_mut())
    }

    /// Writes a single item at the given logical index (`0..len()`).
    ///
    /// # Panics
    ///
    /// Panics if `idx >= len()`.
    pub fn write(&mut self, idx: usize, value: T) {
        if idx < self.head.len() {
            self.head[idx].write(value);
        } else {
            self.tail[idx - self.head.len()].write(value);
        }
    }

    /// Returns the contiguous head slice, plus the wrapped tail slice if any.
    pub fn as_mut_slices(&mut self) -> (&mut [MaybeUninit<T>], &mut [MaybeUninit<T>]) {
        (self.head, self.tail)
    }

    /// Publishes all reserved slots with a single atomic tail update.
    pub fn commit(self) {
        let len = self.len;
        unsafe {
            let ring = &*self.ring_ptr;
            ring.commit_internal(len);
        }
    }
}
