//! The bounded retry loop: one tier of the engine.

use crate::backoff::BackoffSchedule;
use crate::classify::Classifier;
use crate::error::AttemptResult;
use crate::outcome::Outcome;
use crate::policy::RetryPolicy;
use std::future::Future;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Run an operation up to `policy.max_attempts + 1` times, waiting per the
/// schedule between attempts, and capture the result as an [`Outcome`].
///
/// The loop stops early on success or on a failure whose classification
/// does not match the policy. The sleep happens only between attempts,
/// never after the final one, and the final attempt's error is always what
/// ends up in the outcome.
pub async fn run_tier<T, F, Fut>(
    policy: &RetryPolicy,
    schedule: &BackoffSchedule,
    classifier: &Classifier,
    op: F,
) -> Outcome<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = AttemptResult<T>>,
{
    let mut attempt = 0u32;
    loop {
        debug!(attempt, budget = policy.max_attempts, "executing attempt");

        match op().await {
            Ok(value) => return Outcome::Success(value),
            Err(error) => {
                let classes = classifier.classify(&error);
                let matched = policy.matches(classes);

                if !matched || attempt >= policy.max_attempts {
                    if matched {
                        warn!(attempt, error = %error, "retry budget exhausted");
                    } else {
                        debug!(attempt, error = %error, "failure not retryable for this tier");
                    }
                    return Outcome::Failure { error, matched };
                }

                let wait = schedule.delay_for_attempt(attempt);
                debug!(
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    error = %error,
                    "waiting before retry"
                );
                sleep(wait).await;
                attempt += 1;
            }
        }
    }
}
