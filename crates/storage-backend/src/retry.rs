use std::thread;
use std::time::Duration;

/// Fixed retry schedule for transient I/O: `base_delay * 2^(attempt - 1)`,
/// attempts numbered from 1. No jitter and no configurable multiplier —
/// unlike an exporter retrying a flaky network call, a local filesystem
/// fault is either gone on the next attempt or it isn't, so the schedule
/// stays deterministic and easy to reason about in tests.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        assert!(max_attempts >= 1, "max_attempts must be at least 1");
        Self {
            max_attempts,
            base_delay,
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt - 1)
    }

    /// Runs `op` up to `max_attempts` times, sleeping `delay_for_attempt`
    /// between tries. Returns the last error if every attempt fails.
    pub fn retry<T, E>(&self, mut op: impl FnMut(u32) -> Result<T, E>) -> Result<T, E> {
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(v) => return Ok(v),
                Err(e) => {
                    if attempt >= self.max_attempts {
                        return Err(e);
                    }
                    thread::sleep(self.delay_for_attempt(attempt));
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn retry_succeeds_on_third_attempt() {
        let policy = RetryPolicy::new(5, Duration::from_millis(1));
        let calls = Cell::new(0);
        let result: Result<u32, &str> = policy.retry(|_attempt| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err("transient")
            } else {
                Ok(42)
            }
        });
        assert_eq!(result, Ok(42));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn retry_exhausts_after_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let calls = Cell::new(0);
        let result: Result<u32, &str> = policy.retry(|_attempt| {
            calls.set(calls.get() + 1);
            Err("always fails")
        });
        assert_eq!(result, Err("always fails"));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn delay_doubles_each_attempt() {
        let policy = RetryPolicy::new(4, Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(40));
    }
}
