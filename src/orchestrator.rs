//! Fan-out/fan-in execution of independent tasks.

use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Starts every task concurrently and waits for all of them.
///
/// Each task receives its own clone of `cancel`. A failing task never
/// cancels its siblings; only the shared token does. `on_error` is invoked
/// for every error as soon as its task completes, so errors arrive in
/// completion order, not submission order.
///
/// Returns the first error seen. Which error that is depends on completion
/// order, so callers should only treat it as "at least one task failed".
pub async fn launch_and_wait_many<T, F, O, E>(
    cancel: &CancellationToken,
    tasks: impl IntoIterator<Item = T>,
    mut on_error: impl FnMut(&E),
) -> Result<(), E>
where
    T: FnOnce(CancellationToken) -> F,
    F: Future<Output = Result<O, E>>,
{
    let mut pending: FuturesUnordered<F> = tasks
        .into_iter()
        .map(|task| task(cancel.clone()))
        .collect();

    let mut first_error = None;

    while let Some(result) = pending.next().await {
        if let Err(e) = result {
            on_error(&e);
            if first_error.is_none() {
                first_error = Some(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
