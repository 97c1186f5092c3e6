//! Bounded retry with exponential backoff for transient transport failures.

use std::time::Duration;

use rand::Rng;

use super::VisionError;

/// Retry policy for remote calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt. 0 disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,
    /// Multiplier applied per subsequent retry.
    pub backoff_factor: f64,
    /// Upper bound on any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Add ±25% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            backoff_factor: 2.0,
            max_delay_ms: 8_000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-indexed).
    pub fn delay_for(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exp = self.base_delay_ms as f64 * self.backoff_factor.powi(retry as i32 - 1);
        let capped = exp.min(self.max_delay_ms as f64) as u64;

        let delay_ms = if self.jitter && capped >= 4 {
            let spread = (capped / 4) as i64;
            let offset = rand::thread_rng().gen_range(-spread..=spread);
            (capped as i64 + offset).max(0) as u64
        } else {
            capped
        };
        Duration::from_millis(delay_ms)
    }
}

/// Run `call` until it succeeds, fails with a non-transient error, or the
/// policy's retries are spent. `call` receives the 0-based attempt number.
pub fn with_retry<T, F>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<T, VisionError>
where
    F: FnMut(u32) -> Result<T, VisionError>,
{
    let mut attempt = 0u32;
    loop {
        match call(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Remote call failed, retrying"
                );
                std::thread::sleep(delay);
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn instant_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay_ms: 0,
            jitter: false,
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn delays_grow_exponentially_and_cap() {
        let p = RetryPolicy {
            jitter: false,
            ..RetryPolicy::default()
        };
        assert_eq!(p.delay_for(0), Duration::ZERO);
        assert_eq!(p.delay_for(1), Duration::from_millis(500));
        assert_eq!(p.delay_for(2), Duration::from_millis(1_000));
        assert_eq!(p.delay_for(3), Duration::from_millis(2_000));
        assert_eq!(p.delay_for(10), Duration::from_millis(8_000));
    }

    #[test]
    fn jitter_stays_within_quarter() {
        let p = RetryPolicy::default();
        for _ in 0..50 {
            let d = p.delay_for(1).as_millis() as u64;
            assert!((375..=625).contains(&d), "delay {d}");
        }
    }

    #[test]
    fn transient_errors_are_retried_until_success() {
        let calls = Cell::new(0);
        let result = with_retry(&instant_policy(2), "test", |_| {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(VisionError::Timeout(1))
            } else {
                Ok("done")
            }
        });
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn retries_are_bounded() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(&instant_policy(2), "test", |_| {
            calls.set(calls.get() + 1);
            Err(VisionError::Unreachable("http://127.0.0.1:1".into()))
        });
        assert!(matches!(result, Err(VisionError::Unreachable(_))));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn malformed_content_is_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(&instant_policy(5), "test", |_| {
            calls.set(calls.get() + 1);
            Err(VisionError::MalformedResponse("no choices".into()))
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn client_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), _> = with_retry(&instant_policy(5), "test", |_| {
            calls.set(calls.get() + 1);
            Err(VisionError::ApiError {
                status: 401,
                message: "invalid api key".into(),
            })
        });
        assert!(result.is_err());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn attempt_number_is_passed_through() {
        let mut seen = Vec::new();
        let _ = with_retry(&instant_policy(2), "test", |attempt| -> Result<(), VisionError> {
            seen.push(attempt);
            Err(VisionError::Network("reset".into()))
        });
        assert_eq!(seen, vec![0, 1, 2]);
    }
}
