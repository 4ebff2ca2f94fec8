//! Captured result of a tier run.

use crate::error::RequestError;

/// The result of running one retry tier, captured instead of raised.
///
/// Produced once per tier run and never mutated. `matched` records whether
/// the final failure matched the tier's retryable set, which is what
/// decides later whether an exhausted failure may be handed to a
/// persistent-failure callback instead of propagating.
#[derive(Debug)]
pub enum Outcome<T> {
    /// The operation succeeded within the tier's budget.
    Success(T),
    /// The tier gave up.
    Failure {
        /// The last attempt's error, unwrapped and unmodified.
        error: RequestError,
        /// Whether that error matched the tier's retryable set.
        matched: bool,
    },
}

impl<T> Outcome<T> {
    /// Whether the tier run succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Convert into a plain result, discarding the matched marker.
    pub fn into_result(self) -> Result<T, RequestError> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure { error, .. } => Err(error),
        }
    }
}
