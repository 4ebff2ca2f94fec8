//! Per-tier retry policy.

use crate::classify::ClassSet;

/// Immutable configuration for one retry tier: how many retries it may
/// spend and which failure classifications it spends them on.
///
/// `max_attempts` is the retry budget, not the invocation count: an
/// always-failing, always-matching operation is invoked `max_attempts + 1`
/// times before the tier gives up.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Number of retries the tier may perform after the first attempt.
    pub max_attempts: u32,
    /// Classifications this tier treats as retryable.
    pub retryable: ClassSet,
}

impl RetryPolicy {
    /// Create a policy from a budget and a retryable set.
    pub const fn new(max_attempts: u32, retryable: ClassSet) -> Self {
        Self {
            max_attempts,
            retryable,
        }
    }

    /// The outer tier's default: 7 retries over the connection-level
    /// classifications (refused, host-not-found, timeout, 500, 502, and
    /// the custom message match).
    pub const fn connection_level() -> Self {
        Self::new(7, ClassSet::CONNECTION_LEVEL)
    }

    /// The inner tier's default: 11 patient retries on 503 only.
    pub const fn server_overload() -> Self {
        Self::new(11, ClassSet::SERVER_OVERLOAD)
    }

    /// Replace the retry budget.
    pub const fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Whether a failure with the given classifications is retryable
    /// under this policy.
    pub fn matches(&self, classes: ClassSet) -> bool {
        self.retryable.intersects(classes)
    }
}
