//! Background sweep of expired sessions

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::StoreInner;

/// Handle to the running reaper task
pub(crate) struct Reaper {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Reaper {
    /// Spawn the sweep loop. The task holds only a weak reference so a
    /// dropped store also ends it.
    ///
    /// `interval` must be non-zero; `SessionStore::start_reaper` clamps it.
    pub(crate) fn spawn(store: Weak<StoreInner>, interval: Duration) -> Self {
        let (stop, mut stopped) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let now = time::Instant::now();
            let first = now.checked_add(interval).unwrap_or(now);
            let mut ticker = time::interval_at(first, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let Some(inner) = store.upgrade() else {
                            break;
                        };
                        let removed = inner.purge_expired();
                        if removed > 0 {
                            tracing::debug!(removed, "reaper sweep complete");
                        }
                    }
                    _ = stopped.changed() => break,
                }
            }

            tracing::debug!("session reaper stopped");
        });

        Self { stop, handle }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the loop and wait for it to exit
    pub(crate) async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "session reaper task failed");
        }
    }
}
