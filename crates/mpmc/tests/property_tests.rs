//! Property-based tests for the ring invariants.
//!
//! Coverage: `Ring<T>`, the single-shard building block behind `Queue<T>`.

use auditlog_mpmc::{Config, Ring};

// =============================================================================
// INV-SEQ-01: Bounded Count
// "0 <= (tail - head) <= capacity"
// =============================================================================

proptest::proptest! {
    /// INV-SEQ-01: Ring never exceeds capacity after any sequence of operations.
    #[test]
    fn prop_bounded_count_ring(
        writes in 0usize..100,
    ) {
        let config = Config::default();
        let ring = Ring::<u64>::new(config);
        let capacity = ring.capacity();

        let actual_writes = writes.min(capacity);
        for i in 0..actual_writes {
            assert!(ring.push(i as u64));
        }

        proptest::prop_assert!(ring.len() <= capacity,
            "INV-SEQ-01 violated after writes: len {} > capacity {}", ring.len(), capacity);

        let mut read_count = 0;
        ring.consume_up_to_owned(actual_writes, |_| read_count += 1);

        proptest::prop_assert!(ring.len() <= capacity,
            "INV-SEQ-01 violated after reads: len {} > capacity {}", ring.len(), capacity);
        proptest::prop_assert!(read_count <= actual_writes,
            "Read more than written: {} > {}", read_count, actual_writes);
    }
}

// =============================================================================
// INV-SEQ-02: Monotonic Progress
// "len() changes predictably: increases on write, decreases on consume"
// =============================================================================

proptest::proptest! {
    #[test]
    fn prop_monotonic_progress(
        ops in proptest::collection::vec(proptest::bool::ANY, 1..50),
    ) {
        let ring = Ring::<u64>::new(Config::default());

        for write_op in ops {
            let len_before = ring.len();

            if write_op {
                if ring.push(42) {
                    let len_after = ring.len();
                    proptest::prop_assert!(len_after == len_before + 1,
                        "INV-SEQ-02: len didn't increase after successful write: {} -> {}",
                        len_before, len_after);
                }
            } else {
                let consumed = ring.consume_up_to_owned(1, |_| {});
                let len_after = ring.len();
                if consumed > 0 {
                    proptest::prop_assert!(len_after < len_before,
                        "INV-SEQ-02: len didn't decrease after consume: {} -> {} (consumed {})",
                        len_before, len_after, consumed);
                }
            }
        }
    }
}

// =============================================================================
// INV-ORD-03: Happens-Before
// "head <= tail" (consumer never reads ahead of producer)
// =============================================================================

proptest::proptest! {
    #[test]
    fn prop_happens_before(
        writes in 0usize..50,
    ) {
        let ring = Ring::<u64>::new(Config::default());

        let mut produced = 0;
        for i in 0..writes {
            if ring.push(i as u64) {
                produced += 1;
            }
        }

        proptest::prop_assert_eq!(ring.len(), produced,
            "len {} != produced {}", ring.len(), produced);

        let mut consumed = 0;
        ring.consume_up_to_owned(produced, |_| consumed += 1);

        proptest::prop_assert!(consumed <= produced,
            "INV-ORD-03: consumed {} > produced {}", consumed, produced);
        proptest::prop_assert!(ring.is_empty(),
            "INV-ORD-03: ring not empty after consuming all (len={})", ring.len());
    }
}

// =============================================================================
// Batch reservation atomicity: a reservation for `n` always contains exactly
// `n` slots, never fewer, even when it straddles the wrap boundary.
// =============================================================================

proptest::proptest! {
    #[test]
    fn prop_batch_reservation_always_full(
        pre_fill in 0usize..60,
        request_size in 1usize..60,
    ) {
        let config = Config::new(6, 1, false); // 64 slots
        let ring = Ring::<u64>::new(config);
        let capacity = ring.capacity();

        let actual_fill = pre_fill.min(capacity);
        for i in 0..actual_fill {
            assert!(ring.push(i as u64));
        }
        // Drain and refill a bit to force the tail past a wrap point.
        ring.consume_up_to_owned(actual_fill / 2, |_| {});

        let available = capacity - ring.len();
        if let Some(r) = ring.reserve(request_size) {
            proptest::prop_assert_eq!(r.len(), request_size,
                "reservation length {} != requested {} (must never be partial)",
                r.len(), request_size);
            proptest::prop_assert!(request_size <= available);
        } else {
            proptest::prop_assert!(request_size > available);
        }
    }
}
