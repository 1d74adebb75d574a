//! Fixed-interval driver for polling passes.

use std::future::Future;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default time between passes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// One full polling pass across all feeds.
pub trait Pass {
    fn run_pass(&mut self, cancel: &CancellationToken) -> impl Future<Output = ()>;
}

/// Runs a [`Pass`] immediately and then once per interval.
///
/// Ticks are wall-clock periodic. A pass that overruns the interval is
/// followed straight away by the next one; ticks missed in the meantime are
/// dropped, never queued. Passes never overlap.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    interval: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Drives `target` until `cancel` fires.
    ///
    /// A pass in flight when the token fires is allowed to unwind (its tasks
    /// observe the same token); no pass starts after cancellation.
    pub async fn run<P: Pass>(&self, target: &mut P, cancel: &CancellationToken) {
        if cancel.is_cancelled() {
            return;
        }

        // Initial pass so the first sync does not wait a whole interval
        target.run_pass(cancel).await;

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("Scheduler stopped");
                    return;
                }
                _ = ticker.tick() => target.run_pass(cancel).await,
            }
        }
    }
}
