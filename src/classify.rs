//! Failure classification over an error's cause chain.
//!
//! Classification never looks at the top-level error alone: the error and
//! every node reachable through [`std::error::Error::source`] are tested,
//! so a refused connection buried two wrappers deep still classifies.

use crate::error::RequestError;
use std::error::Error as StdError;
use std::fmt;

/// The retry category a failure belongs to.
///
/// A failure may carry several classifications at once (see [`ClassSet`]);
/// an empty set means the failure is unclassified and must not be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FailureClassification {
    /// The remote host actively refused the connection.
    ConnectionRefused,
    /// Name resolution failed.
    HostNotFound,
    /// The attempt timed out or was cancelled by a deadline.
    Timeout,
    /// HTTP 500.
    ServerError5xx,
    /// HTTP 502.
    BadGateway,
    /// HTTP 503. Consumed by the overload tier only.
    ServiceUnavailable,
    /// The error message contained the caller-supplied fragment.
    CustomMessageMatch,
}

impl FailureClassification {
    const ALL: [FailureClassification; 7] = [
        FailureClassification::ConnectionRefused,
        FailureClassification::HostNotFound,
        FailureClassification::Timeout,
        FailureClassification::ServerError5xx,
        FailureClassification::BadGateway,
        FailureClassification::ServiceUnavailable,
        FailureClassification::CustomMessageMatch,
    ];

    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// A small set of [`FailureClassification`] values.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassSet(u8);

impl ClassSet {
    /// The empty set: unclassified, do not retry.
    pub const EMPTY: ClassSet = ClassSet(0);

    /// Classifications the connection-level (outer) tier retries.
    pub const CONNECTION_LEVEL: ClassSet = ClassSet::of(&[
        FailureClassification::ConnectionRefused,
        FailureClassification::HostNotFound,
        FailureClassification::Timeout,
        FailureClassification::ServerError5xx,
        FailureClassification::BadGateway,
        FailureClassification::CustomMessageMatch,
    ]);

    /// Classification the server-overload (inner) tier retries.
    pub const SERVER_OVERLOAD: ClassSet = ClassSet::of(&[FailureClassification::ServiceUnavailable]);

    /// Build a set from a slice of classifications.
    pub const fn of(classes: &[FailureClassification]) -> ClassSet {
        let mut bits = 0u8;
        let mut i = 0;
        while i < classes.len() {
            bits |= classes[i].bit();
            i += 1;
        }
        ClassSet(bits)
    }

    /// Add a classification to the set.
    pub fn insert(&mut self, class: FailureClassification) {
        self.0 |= class.bit();
    }

    /// Whether the set contains the given classification.
    pub fn contains(self, class: FailureClassification) -> bool {
        self.0 & class.bit() != 0
    }

    /// Whether the set shares any classification with `other`.
    pub fn intersects(self, other: ClassSet) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether the set is empty (the failure is unclassified).
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate over the classifications in the set.
    pub fn iter(self) -> impl Iterator<Item = FailureClassification> {
        FailureClassification::ALL
            .into_iter()
            .filter(move |c| self.contains(*c))
    }
}

impl fmt::Debug for ClassSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Classifies failures for one execution.
///
/// Carries the caller's idempotency declaration and optional extra message
/// fragment. Both tiers of an execution share one classifier; the per-tier
/// [`RetryPolicy`](crate::policy::RetryPolicy) decides which of the
/// resulting classifications it acts on.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    /// Whether the operation is safe to invoke more than once.
    pub idempotent: bool,
    /// Extra message fragment treated as retryable when present in the
    /// failure's message. Only consulted for idempotent operations.
    pub handled_fragment: Option<String>,
}

impl Classifier {
    /// Create a classifier for an operation with the given idempotency.
    pub fn new(idempotent: bool) -> Self {
        Self {
            idempotent,
            handled_fragment: None,
        }
    }

    /// Set the extra handled message fragment.
    pub fn handled_fragment(mut self, fragment: impl Into<String>) -> Self {
        self.handled_fragment = Some(fragment.into());
        self
    }

    /// Classify a failure by walking its cause chain.
    pub fn classify(&self, error: &RequestError) -> ClassSet {
        classify(error, self.idempotent, self.handled_fragment.as_deref())
    }
}

/// Walk `error` and its causes, returning every classification that any
/// node in the chain matches.
///
/// `HostNotFound` and `ServiceUnavailable` are tested unconditionally; all
/// other categories apply only when `idempotent` is true, because retrying
/// a non-idempotent request that may have already reached the server is
/// unsafe. The fragment match additionally requires a non-empty fragment.
pub fn classify(error: &RequestError, idempotent: bool, fragment: Option<&str>) -> ClassSet {
    let mut set = ClassSet::EMPTY;
    let fragment = fragment.filter(|f| !f.is_empty());

    for node in cause_chain(error) {
        if let Some(request) = node.downcast_ref::<RequestError>() {
            match request {
                RequestError::HostNotFound => set.insert(FailureClassification::HostNotFound),
                RequestError::ConnectionRefused if idempotent => {
                    set.insert(FailureClassification::ConnectionRefused)
                }
                RequestError::Timeout if idempotent => set.insert(FailureClassification::Timeout),
                RequestError::Http { status: 500, .. } if idempotent => {
                    set.insert(FailureClassification::ServerError5xx)
                }
                RequestError::Http { status: 502, .. } if idempotent => {
                    set.insert(FailureClassification::BadGateway)
                }
                RequestError::Http { status: 503, .. } => {
                    set.insert(FailureClassification::ServiceUnavailable)
                }
                _ => {}
            }
        }

        if let Some(io) = node.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionRefused if idempotent => {
                    set.insert(FailureClassification::ConnectionRefused)
                }
                std::io::ErrorKind::TimedOut if idempotent => {
                    set.insert(FailureClassification::Timeout)
                }
                _ => {}
            }
        }

        if idempotent {
            if let Some(needle) = fragment {
                if node.to_string().contains(needle) {
                    set.insert(FailureClassification::CustomMessageMatch);
                }
            }
        }
    }

    set
}

/// The error itself followed by every transitive cause.
fn cause_chain<'a>(
    error: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(error), |&node| node.source())
}
