//! Run every action, report the first failure.

use futures::future::BoxFuture;
use std::fmt::Display;
use tracing::warn;

/// Run every action in order, even after failures, and return the first
/// failure encountered.
///
/// Every action is awaited exactly once regardless of the others'
/// outcomes. The first failure (by position, not severity) is returned
/// verbatim after all actions have run; later failures are logged at warn
/// level and then discarded.
///
/// # Example
///
/// ```ignore
/// use backstop::run_all;
/// use futures::FutureExt;
///
/// run_all(vec![
///     flush_cache().boxed(),
///     close_session().boxed(),
///     remove_scratch_dir().boxed(),
/// ])
/// .await?;
/// ```
pub async fn run_all<'a, E, I>(actions: I) -> Result<(), E>
where
    E: Display,
    I: IntoIterator<Item = BoxFuture<'a, Result<(), E>>>,
{
    let mut first_failure: Option<E> = None;

    for (index, action) in actions.into_iter().enumerate() {
        if let Err(error) = action.await {
            if first_failure.is_none() {
                first_failure = Some(error);
            } else {
                warn!(index, error = %error, "suppressing failure after an earlier one");
            }
        }
    }

    match first_failure {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
