//! Periodic removal of idle identifiers.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::limiter::RateLimiter;

/// Spawn a task that sweeps `limiter` every `interval`.
///
/// The task runs until the returned handle is aborted.
pub fn spawn_sweeper(limiter: Arc<RateLimiter>, interval: Duration) -> JoinHandle<()> {
    info!(interval_secs = interval.as_secs_f64(), "Starting identifier sweeper");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing to sweep yet.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let removed = limiter.sweep();
            if removed > 0 {
                debug!(
                    removed,
                    remaining = limiter.tracked_identifiers(),
                    "Swept idle identifiers"
                );
            }
        }
    })
}
