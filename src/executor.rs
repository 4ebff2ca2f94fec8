//! Two-tier resilient execution.
//!
//! The inner tier wraps a single invocation of the caller's operation and
//! patiently retries 503s only; the outer tier wraps the inner tier's
//! entire run and retries connection-level failures, gated by the
//! caller's idempotency declaration. `ServiceUnavailable` gets its own
//! tier because overloaded servers need many more, more patient retries
//! than a refused connection, and a 503 is safe to retry even for
//! non-idempotent requests.
//!
//! A call may block its task for a long, bounded time (worst case several
//! minutes with the default budgets); invoke it only from background or
//! batch contexts that tolerate that.

use crate::backoff::BackoffSchedule;
use crate::classify::Classifier;
use crate::error::{AttemptResult, RequestError};
use crate::outcome::Outcome;
use crate::policy::RetryPolicy;
use crate::tier::run_tier;
use std::future::Future;
use tracing::warn;

/// Composes the two retry tiers around a caller-supplied operation.
///
/// All configuration is fixed at construction and the executor holds no
/// mutable state, so one executor may serve any number of concurrent,
/// independent calls.
///
/// # Example
///
/// ```ignore
/// use backstop::ResilientExecutor;
///
/// let executor = ResilientExecutor::new(true).handled_message("proxy hiccup");
/// let body = executor.execute(|| async { fetch_once().await }).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ResilientExecutor {
    classifier: Classifier,
    outer: RetryPolicy,
    outer_backoff: BackoffSchedule,
    inner: RetryPolicy,
    inner_backoff: BackoffSchedule,
}

impl ResilientExecutor {
    /// Create an executor with the default tiers: 7 connection-level
    /// retries outside, 11 overload retries inside, both on a 2-second
    /// exponential backoff base.
    ///
    /// `idempotent` is the caller's promise that the operation is safe to
    /// invoke more than once; it gates which failure classes the outer
    /// tier will retry.
    pub fn new(idempotent: bool) -> Self {
        Self {
            classifier: Classifier::new(idempotent),
            outer: RetryPolicy::connection_level(),
            outer_backoff: BackoffSchedule::default(),
            inner: RetryPolicy::server_overload(),
            inner_backoff: BackoffSchedule::default(),
        }
    }

    /// Treat failures whose message contains `fragment` as retryable at
    /// the outer tier (idempotent operations only).
    pub fn handled_message(mut self, fragment: impl Into<String>) -> Self {
        self.classifier = self.classifier.handled_fragment(fragment);
        self
    }

    /// Replace the outer tier's policy.
    pub fn outer_policy(mut self, policy: RetryPolicy) -> Self {
        self.outer = policy;
        self
    }

    /// Replace the outer tier's backoff schedule.
    pub fn outer_backoff(mut self, schedule: BackoffSchedule) -> Self {
        self.outer_backoff = schedule;
        self
    }

    /// Replace the inner tier's policy.
    pub fn inner_policy(mut self, policy: RetryPolicy) -> Self {
        self.inner = policy;
        self
    }

    /// Replace the inner tier's backoff schedule.
    pub fn inner_backoff(mut self, schedule: BackoffSchedule) -> Self {
        self.inner_backoff = schedule;
        self
    }

    /// Whether the operation was declared idempotent.
    pub fn is_idempotent(&self) -> bool {
        self.classifier.idempotent
    }

    /// Execute the operation through both tiers.
    ///
    /// Does not resolve until the whole nested retry sequence completes or
    /// is abandoned. On failure the final attempt's error propagates
    /// unchanged, with its full cause chain intact.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, RequestError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AttemptResult<T>>,
    {
        self.run(op).await.into_result()
    }

    /// Execute the operation, handing an exhausted transient failure to
    /// `on_persistent_failure` instead of propagating it.
    ///
    /// The callback fires exactly once, and only when the outer tier spent
    /// its whole budget on a failure it recognized as transient; in that
    /// case `Ok(None)` is returned. Unrecognized failures still propagate.
    /// This is an explicit hand-off, never a silent swallow.
    pub async fn execute_or_else<T, F, Fut, H>(
        &self,
        op: F,
        on_persistent_failure: H,
    ) -> Result<Option<T>, RequestError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AttemptResult<T>>,
        H: FnOnce(&RequestError),
    {
        match self.run(op).await {
            Outcome::Success(value) => Ok(Some(value)),
            Outcome::Failure {
                error,
                matched: true,
            } => {
                warn!(error = %error, "handing persistent transient failure to caller");
                on_persistent_failure(&error);
                Ok(None)
            }
            Outcome::Failure { error, .. } => Err(error),
        }
    }

    /// Run both tiers and capture the outer tier's outcome.
    async fn run<T, F, Fut>(&self, op: F) -> Outcome<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AttemptResult<T>>,
    {
        let outer_op = || self.run_inner(&op);
        run_tier(&self.outer, &self.outer_backoff, &self.classifier, outer_op).await
    }

    /// One outer attempt: the inner tier's entire run over the operation.
    async fn run_inner<T, F, Fut>(&self, op: &F) -> AttemptResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = AttemptResult<T>>,
    {
        run_tier(&self.inner, &self.inner_backoff, &self.classifier, op)
            .await
            .into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast(executor: ResilientExecutor) -> ResilientExecutor {
        let ms = BackoffSchedule::new(Duration::from_millis(1));
        executor.outer_backoff(ms).inner_backoff(ms)
    }

    #[tokio::test]
    async fn overload_recovery_stays_in_the_inner_tier() {
        let calls = AtomicU32::new(0);
        let executor = fast(ResilientExecutor::new(true));

        let result = executor
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 5 {
                        Err(RequestError::http(503, "overloaded"))
                    } else {
                        Ok("served")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "served");
        // Five 503s then success, all absorbed by one outer attempt.
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn non_idempotent_refusal_propagates_immediately() {
        let calls = AtomicU32::new(0);
        let executor = fast(ResilientExecutor::new(false));

        let result: Result<(), _> = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(RequestError::ConnectionRefused) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result.unwrap_err(),
            RequestError::ConnectionRefused
        ));
    }

    #[tokio::test]
    async fn idempotent_refusal_exhausts_the_outer_budget() {
        let calls = AtomicU32::new(0);
        let executor = fast(ResilientExecutor::new(true))
            .outer_policy(RetryPolicy::connection_level().max_attempts(2));

        let result: Result<(), _> = executor
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(RequestError::ConnectionRefused) }
            })
            .await;

        // Refusals never enter the inner tier, so invocations equal outer
        // attempts: initial + 2 retries.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn persistent_failure_callback_fires_once_instead_of_propagating() {
        let handled = AtomicU32::new(0);
        let executor = fast(ResilientExecutor::new(true))
            .outer_policy(RetryPolicy::connection_level().max_attempts(1));

        let result: Result<Option<()>, _> = executor
            .execute_or_else(
                || async { Err(RequestError::Timeout) },
                |_error| {
                    handled.fetch_add(1, Ordering::SeqCst);
                },
            )
            .await;

        assert_eq!(handled.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Ok(None)));
    }

    #[tokio::test]
    async fn unrecognized_failure_skips_the_callback() {
        let handled = AtomicU32::new(0);
        let executor = fast(ResilientExecutor::new(true));

        let result: Result<Option<()>, _> = executor
            .execute_or_else(
                || async { Err(RequestError::http(404, "not found")) },
                |_error| {
                    handled.fetch_add(1, Ordering::SeqCst);
                },
            )
            .await;

        assert_eq!(handled.load(Ordering::SeqCst), 0);
        assert_eq!(result.unwrap_err().status(), Some(404));
    }

    #[tokio::test]
    async fn exhausted_inner_tier_does_not_match_the_outer_policy() {
        let calls = AtomicU32::new(0);
        let handled = AtomicU32::new(0);
        let executor = fast(ResilientExecutor::new(true))
            .inner_policy(RetryPolicy::server_overload().max_attempts(2));

        let result: Result<Option<()>, _> = executor
            .execute_or_else(
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(RequestError::http(503, "still overloaded")) }
                },
                |_error| {
                    handled.fetch_add(1, Ordering::SeqCst);
                },
            )
            .await;

        // The inner tier spends its budget; the outer tier sees a 503,
        // which is not in its set, so the error propagates unhandled.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(handled.load(Ordering::SeqCst), 0);
        assert_eq!(result.unwrap_err().status(), Some(503));
    }

    #[tokio::test]
    async fn handled_message_makes_unknown_failures_retryable() {
        let calls = AtomicU32::new(0);
        let executor = fast(ResilientExecutor::new(true))
            .outer_policy(RetryPolicy::connection_level().max_attempts(2))
            .handled_message("proxy hiccup");

        let result = executor
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(RequestError::Other(anyhow::anyhow!(
                            "upstream proxy hiccup, please retry"
                        )))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
