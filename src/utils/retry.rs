//! Bounded retry combinator
//!
//! Repeats a boolean operation with a sleep between attempts.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// How the delay grows between attempts
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Backoff {
    Fixed,
    Exponential { factor: u32, max_interval_secs: u64 },
}

/// Retry bound and pacing
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            interval: Duration::from_secs(5),
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            backoff: Backoff::Fixed,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Attempts actually made; a zero bound still tries once
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay to wait after the given (1-based) failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential {
                factor,
                max_interval_secs,
            } => {
                let exp = attempt.saturating_sub(1).min(16);
                let scaled = self.interval.saturating_mul(factor.max(1).saturating_pow(exp));
                scaled.min(Duration::from_secs(max_interval_secs))
            }
        }
    }
}

/// Run `op` until it returns true or the policy is exhausted.
///
/// Sleeps between attempts but not after the last one.
pub async fn retry<F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let attempts = policy.attempts();

    for attempt in 1..=attempts {
        debug!("{} attempt {}/{}", label, attempt, attempts);

        if op().await {
            return true;
        }

        if attempt < attempts {
            let delay = policy.delay_after(attempt);
            debug!("{} not ready, retrying in {}ms", label, delay.as_millis());
            sleep(delay).await;
        }
    }

    warn!("{} gave up after {} attempts", label, attempts);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn instant(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_retry_succeeds_on_last_attempt() {
        let calls = Cell::new(0);
        let ok = retry(&instant(3), "probe", || {
            calls.set(calls.get() + 1);
            let n = calls.get();
            async move { n == 3 }
        })
        .await;

        assert!(ok);
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausts() {
        let calls = Cell::new(0);
        let ok = retry(&instant(4), "probe", || {
            calls.set(calls.get() + 1);
            async { false }
        })
        .await;

        assert!(!ok);
        assert_eq!(calls.get(), 4);
    }

    #[tokio::test]
    async fn test_zero_bound_tries_once() {
        let calls = Cell::new(0);
        retry(&instant(0), "probe", || {
            calls.set(calls.get() + 1);
            async { false }
        })
        .await;

        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_fixed_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_secs(5));
        assert_eq!(policy.delay_after(3), Duration::from_secs(5));
    }

    #[test]
    fn test_exponential_delay_is_capped() {
        let policy = RetryPolicy::new(6, Duration::from_secs(2)).with_backoff(Backoff::Exponential {
            factor: 2,
            max_interval_secs: 10,
        });

        assert_eq!(policy.delay_after(1), Duration::from_secs(2));
        assert_eq!(policy.delay_after(2), Duration::from_secs(4));
        assert_eq!(policy.delay_after(3), Duration::from_secs(8));
        assert_eq!(policy.delay_after(4), Duration::from_secs(10));
    }
}
