//! Retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// Retry parameters for one kind of operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total calls are `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            multiplier,
        }
    }

    /// Whole-search fetches: few, slow retries.
    pub fn search_default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(60), 2.0)
    }

    /// Per-listing detail fetches: short backoff, capped early.
    pub fn detail_default() -> Self {
        Self::new(2, Duration::from_millis(500), Duration::from_secs(15), 1.5)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Backoff before retry number `attempt` (0-based), without jitter.
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exp);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }

    /// Backoff plus up to 10% jitter, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = self.base_delay_for(attempt);
        let jitter_ceiling = delay.as_secs_f64() * 0.1;
        let jitter = if jitter_ceiling > 0.0 {
            rand::thread_rng().gen_range(0.0..=jitter_ceiling)
        } else {
            0.0
        };
        (delay + Duration::from_secs_f64(jitter)).min(self.max_delay)
    }

    /// Run `op` until it succeeds or the retry budget is spent.
    ///
    /// The last error is returned unchanged. Nothing is logged when the
    /// first attempt succeeds.
    pub async fn run<T, E, F, Fut>(&self, label: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_retries => {
                    let delay = self.delay_for(attempt);
                    attempt += 1;
                    warn!(
                        "{}: attempt {}/{} failed ({}), retrying in {:?}",
                        label,
                        attempt,
                        self.max_retries + 1,
                        err,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(1), Duration::from_millis(5), 2.0)
    }

    #[derive(Debug, PartialEq)]
    struct Boom(u32);

    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "boom #{}", self.0)
        }
    }

    #[test]
    fn test_delay_growth_and_cap() {
        let policy = RetryPolicy::search_default();
        assert_eq!(policy.base_delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.base_delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.base_delay_for(10), Duration::from_secs(60));

        for attempt in 0..8 {
            let base = policy.base_delay_for(attempt);
            let delay = policy.delay_for(attempt);
            assert!(delay >= base);
            assert!(delay <= policy.max_delay);
            assert!(delay.as_secs_f64() <= base.as_secs_f64() * 1.1 + 1e-6);
        }
    }

    #[test]
    fn test_detail_defaults() {
        let policy = RetryPolicy::detail_default();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_delay_for(1), Duration::from_millis(750));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries_plus_one() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Boom> = fast(3)
            .run("search", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(Boom(n))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        // Last error comes back untouched
        assert_eq!(result, Err(Boom(4)));
    }

    #[tokio::test]
    async fn test_recovers_mid_budget() {
        let calls = AtomicU32::new(0);
        let result = fast(2)
            .run("detail", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 2 {
                    Err(Boom(n))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_retries_calls_once() {
        let calls = AtomicU32::new(0);
        let _ = fast(0)
            .run("once", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(Boom(1))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
