//! # backstop
//!
//! A resilient execution engine: runs a caller-supplied unit of work
//! (typically a network request) with automated recovery from transient
//! failures.
//!
//! ## Core Concepts
//!
//! - **[`RequestError`]**: the classifiable failure shape; its cause chain
//!   is what classification inspects
//! - **[`classify`]**: maps a failure (and every cause beneath it) to a
//!   set of retry categories, gated by the caller's idempotency declaration
//! - **[`RetryPolicy`]** / **[`BackoffSchedule`]**: one tier's retry
//!   budget and exponential wait schedule
//! - **[`Outcome`]**: the captured result of a tier run, inspected before
//!   any error surfaces
//! - **[`ResilientExecutor`]**: composes the two tiers (an inner loop
//!   patiently retrying 503s, an outer loop retrying connection-level
//!   failures) and optionally hands an exhausted transient failure to a
//!   callback instead of propagating it
//!
//! Two simpler primitives ride along: [`retry_until_success`], a bounded
//! fixed-interval loop with no classification, and [`run_all`], which runs
//! every action and reports the first failure.
//!
//! ## Example
//!
//! ```ignore
//! use backstop::ResilientExecutor;
//!
//! let executor = ResilientExecutor::new(true);
//!
//! let body = executor
//!     .execute(|| async {
//!         // One attempt of your request, failures as RequestError.
//!         fetch_once().await
//!     })
//!     .await?;
//! ```
//!
//! ## HTTP helpers
//!
//! ```ignore
//! use backstop::RetryClient;
//!
//! let client = RetryClient::default();
//! let text = client.get_text("https://example.com/report", false, None).await?;
//! ```
//!
//! A call may block its task for minutes with the default budgets; use
//! only from background contexts that tolerate that.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod backoff;
pub mod classify;
pub mod dest;
pub mod error;
pub mod executor;
pub mod multi;
pub mod outcome;
pub mod policy;
pub mod simple;
pub mod tier;
pub mod transport;

// Re-exports
pub use backoff::BackoffSchedule;
pub use classify::{classify, ClassSet, Classifier, FailureClassification};
pub use dest::{Destination, FileDestination};
pub use error::{AttemptResult, RequestError};
pub use executor::ResilientExecutor;
pub use multi::run_all;
pub use outcome::Outcome;
pub use policy::RetryPolicy;
pub use simple::{retry_until_success, RetryLoop};
pub use tier::run_tier;
pub use transport::{RetryClient, RetryClientBuilder};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        retry_until_success, run_all, AttemptResult, BackoffSchedule, Outcome, RequestError,
        ResilientExecutor, RetryClient, RetryLoop, RetryPolicy,
    };
}
