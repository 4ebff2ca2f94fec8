//! Generic bounded retry-until-success loop.
//!
//! Unlike the tiered engine this performs no classification: every failure
//! is treated as retryable until the budget runs out, and the wait between
//! attempts is fixed rather than exponential. Its use case is "retry this
//! flaky local operation", not network-error triage, so the final failure
//! is wrapped under the caller's message instead of propagating bare.

use anyhow::Context;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Configuration for [`retry_until_success`].
#[derive(Debug, Clone, Copy)]
pub struct RetryLoop {
    /// Retries allowed after the initial attempt.
    pub max_attempts: u32,
    /// Fixed wait between attempts.
    pub interval: Duration,
}

impl Default for RetryLoop {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(2),
        }
    }
}

impl RetryLoop {
    /// Create the default loop: 30 retries, 2 seconds apart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry budget.
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the fixed wait between attempts.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

/// Invoke `op` until it succeeds or the budget is exhausted.
///
/// The operation runs once initially plus up to `max_attempts` retries,
/// i.e. `max_attempts + 1` invocations in total. When every attempt has
/// failed, the final error is returned wrapped under `failure_message`,
/// with the original error kept as the cause.
pub async fn retry_until_success<T, F, Fut>(
    config: &RetryLoop,
    failure_message: &str,
    op: F,
) -> anyhow::Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < config.max_attempts => {
                debug!(
                    attempt,
                    budget = config.max_attempts,
                    error = %error,
                    "attempt failed, waiting before retry"
                );
                sleep(config.interval).await;
                attempt += 1;
            }
            Err(error) => return Err(error).context(failure_message.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryLoop {
        RetryLoop::new()
            .max_attempts(max_attempts)
            .interval(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let value = retry_until_success(&fast(3), "never seen", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(anyhow::anyhow!("flaky"))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn budget_of_three_means_four_invocations() {
        let calls = AtomicU32::new(0);
        let result: anyhow::Result<()> = retry_until_success(&fast(3), "gave up", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::anyhow!("always fails")) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        let error = result.unwrap_err();
        assert_eq!(error.to_string(), "gave up");
        // The original failure stays reachable as the cause.
        assert_eq!(error.chain().count(), 2);
        assert_eq!(error.chain().nth(1).unwrap().to_string(), "always fails");
    }

    #[tokio::test]
    async fn default_budget_is_thirty() {
        let config = RetryLoop::default();
        assert_eq!(config.max_attempts, 30);
        assert_eq!(config.interval, Duration::from_secs(2));
    }
}
