use std::hint;
use std::thread;
use std::time::{Duration, Instant};

/// Adaptive backoff strategy (Crossbeam-style).
///
/// Progressively increases wait time: spin with PAUSE → yield to OS → give up.
#[derive(Debug)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6; // 2^6 = 64 spins max before yielding
    const YIELD_LIMIT: u32 = 10; // Then give up

    /// Creates a new backoff instance.
    #[inline]
    pub fn new() -> Self {
        Self { step: 0 }
    }

    /// Light spin with PAUSE hints.
    #[inline]
    pub fn spin(&mut self) {
        let spins = 1 << self.step.min(Self::SPIN_LIMIT);
        for _ in 0..spins {
            hint::spin_loop();
        }
        if self.step <= Self::SPIN_LIMIT {
            self.step += 1;
        }
    }

    /// Heavier backoff: spin then yield.
    #[inline]
    pub fn snooze(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            self.spin();
        } else {
            thread::yield_now();
            if self.step <= Self::YIELD_LIMIT {
                self.step += 1;
            }
        }
    }

    /// Check if we've exhausted patience.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.step > Self::YIELD_LIMIT
    }

    /// Reset for next wait cycle.
    #[inline]
    pub fn reset(&mut self) {
        self.step = 0;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

/// Exponential backoff with jitter for `enqueue_blocking`, sleeping in
/// millisecond-scale steps rather than spinning.
///
/// Schedule: start at 1ms, double each attempt up to a 100ms cap, add uniform
/// jitter in `[0, 20%]` of the current backoff, and never sleep past the
/// caller's remaining timeout.
#[derive(Debug)]
pub struct BlockingBackoff {
    deadline: Instant,
    current: Duration,
}

impl BlockingBackoff {
    const INITIAL: Duration = Duration::from_millis(1);
    const MAX: Duration = Duration::from_millis(100);

    pub fn new(timeout: Duration) -> Self {
        Self {
            deadline: Instant::now() + timeout,
            current: Self::INITIAL,
        }
    }

    /// True if the deadline has already passed.
    pub fn expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Sleeps for the next backoff step (clamped to the remaining timeout),
    /// then doubles the step for next time. Returns `false` without sleeping
    /// if the deadline has already passed.
    pub fn sleep_step(&mut self) -> bool {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return false;
        }

        let wait = (self.current + jitter(self.current)).min(remaining);
        thread::sleep(wait);

        self.current = (self.current * 2).min(Self::MAX);
        true
    }
}

/// Uniform jitter in `[0, 20%]` of `base`, seeded from a monotonic clock
/// sample so no RNG dependency is needed on this hot path.
fn jitter(base: Duration) -> Duration {
    let sample = Instant::now().elapsed().subsec_nanos() as u64;
    let frac = (sample % 2000) as f64 / 10000.0; // in [0, 0.2)
    Duration::from_nanos((base.as_nanos() as f64 * frac) as u64)
}
