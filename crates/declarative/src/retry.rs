//! Retry with exponential backoff for transient failures

use crate::context::CallContext;
use std::thread;
use std::time::Duration;

/// Retry policy applied by the batch executor
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// A config that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Run `operation` until it succeeds, `should_retry` rejects its result, or
/// attempts run out
///
/// The last result is returned as-is. No retry is scheduled once the
/// context is cancelled or when the backoff would outlast its deadline.
pub fn with_retry<T, F, P>(config: &RetryConfig, ctx: &CallContext, mut operation: F, should_retry: P) -> T
where
    F: FnMut() -> T,
    P: Fn(&T) -> bool,
{
    let mut attempt = 0;
    loop {
        let result = operation();
        attempt += 1;

        if attempt >= config.max_attempts || !should_retry(&result) || ctx.is_cancelled() {
            return result;
        }

        let delay = config.delay_for_attempt(attempt - 1);
        if ctx.remaining().is_some_and(|left| left <= delay) {
            log::debug!("Not retrying: backoff of {delay:?} exceeds the deadline");
            return result;
        }

        log::warn!(
            "Attempt {}/{} failed, retrying in {:.1}s",
            attempt,
            config.max_attempts,
            delay.as_secs_f64()
        );
        thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Instant;

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_delay_calculation() {
        let config = RetryConfig::new(5, Duration::from_secs(1), 2.0);
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(30));
    }

    #[test]
    fn test_success_first_try() {
        let calls = Cell::new(0);
        let result = with_retry(
            &RetryConfig::no_retry(),
            &CallContext::new(),
            || {
                calls.set(calls.get() + 1);
                Ok::<_, ()>(42)
            },
            Result::is_err,
        );
        assert_eq!(result, Ok(42));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_eventual_success() {
        let calls = Cell::new(0);
        let result = with_retry(
            &fast(3),
            &CallContext::new(),
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 { Err("timeout") } else { Ok(7) }
            },
            Result::is_err,
        );
        assert_eq!(result, Ok(7));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_all_attempts_fail() {
        let calls = Cell::new(0);
        let result: Result<(), &str> = with_retry(
            &fast(3),
            &CallContext::new(),
            || {
                calls.set(calls.get() + 1);
                Err("timeout")
            },
            Result::is_err,
        );
        assert!(result.is_err());
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_non_retryable_stops_immediately() {
        let calls = Cell::new(0);
        let _: Result<(), &str> = with_retry(
            &fast(5),
            &CallContext::new(),
            || {
                calls.set(calls.get() + 1);
                Err("bad request")
            },
            |_| false,
        );
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_cancelled_context_stops_retries() {
        let calls = Cell::new(0);
        let ctx = CallContext::new().with_deadline(Instant::now());
        let _: Result<(), &str> = with_retry(
            &fast(5),
            &ctx,
            || {
                calls.set(calls.get() + 1);
                Err("timeout")
            },
            Result::is_err,
        );
        assert_eq!(calls.get(), 1);
    }
}
