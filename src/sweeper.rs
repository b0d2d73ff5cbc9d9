//! Periodic cleanup of expired rate limit records.
//!
//! One tokio task ticks at the configured interval and asks every store to
//! delete records whose window or block has elapsed. Sweep errors are logged
//! and swallowed; a failed sweep just means the records go next cycle or via
//! insert-time eviction in the fallback store.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::store::RateLimitStore;

/// Handle to the background sweep task. Owns the task: dropping the handle
/// without calling [`CleanupSweeper::shutdown`] leaves the task running for
/// the life of the runtime.
pub struct CleanupSweeper {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl CleanupSweeper {
    /// Spawn the sweep task over the given stores.
    pub fn start(stores: Vec<Arc<dyn RateLimitStore>>, interval: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        sweep(&stores).await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("cleanup sweeper stopped");
        });

        info!(interval_secs = interval.as_secs(), "cleanup sweeper started");
        Self {
            shutdown_tx,
            handle,
        }
    }

    /// Stop the sweep task and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

async fn sweep(stores: &[Arc<dyn RateLimitStore>]) {
    let now_ms = Utc::now().timestamp_millis();
    for store in stores {
        match store.cleanup_expired(now_ms, None).await {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "swept expired rate limit records"),
            Err(e) => warn!(error = %e, "rate limit sweep failed"),
        }
    }
}
