//! Expiry sweep, orphan-edge reclamation, and the background sweeper task.
//!
//! Expiry is local: sweeping an expired entry never touches its dependents,
//! which may still be inside their own TTL. Only explicit invalidation
//! cascades.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::manager::ContentCache;
use super::store::EntryStore;

/// Outcome of one [`sweep_all`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub orphans: usize,
    pub total: usize,
}

/// Delete every entry expired at `now`. Returns the number deleted.
///
/// Edges pointing at the deleted keys are left for
/// [`reclaim_orphan_dependencies`].
pub fn sweep_expired(store: &mut EntryStore, now: Instant) -> usize {
    let before = store.len();
    store.retain(|_, entry| !entry.is_expired_at(now));
    before - store.len()
}

/// Prune every `dependencies`/`dependents` reference to an absent key.
///
/// Returns the number of references removed. Entries themselves are never
/// deleted here, so a second pass with no intervening mutation returns 0.
pub fn reclaim_orphan_dependencies(store: &mut EntryStore) -> usize {
    let present: std::collections::HashSet<_> = store.keys().into_iter().collect();
    let mut removed = 0;

    for (_, entry) in store.entries_mut() {
        let deps_before = entry.dependencies.len();
        entry.dependencies.retain(|key| present.contains(key));
        let dependents_before = entry.dependents.len();
        entry.dependents.retain(|key| present.contains(key));

        removed += deps_before - entry.dependencies.len();
        removed += dependents_before - entry.dependents.len();
    }

    removed
}

/// Expired entries first, then orphans, so the orphan pass already sees
/// this pass's removals.
pub fn sweep_all(store: &mut EntryStore, now: Instant) -> SweepReport {
    let expired = sweep_expired(store, now);
    let orphans = reclaim_orphan_dependencies(store);
    SweepReport {
        expired,
        orphans,
        total: expired + orphans,
    }
}

/// Handle to the background sweeper started by [`spawn_sweeper`].
pub struct SweeperHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the task and wait for it to finish its current tick.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            debug!(
                target = "newsroom::cache::sweep",
                error = %err,
                "sweeper task ended abnormally"
            );
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Run [`ContentCache::try_sweep`] every `interval` until stopped.
///
/// The first tick fires one full interval after start. Ticks missed while a
/// sweep runs are skipped rather than bunched up.
pub fn spawn_sweeper(cache: Arc<ContentCache>, interval: Duration) -> SweeperHandle {
    let (shutdown, mut stop) = watch::channel(false);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            target = "newsroom::cache::sweep",
            interval_ms = interval.as_millis() as u64,
            "cache sweeper started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    cache.try_sweep();
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        info!(target = "newsroom::cache::sweep", "cache sweeper stopped");
    });

    SweeperHandle { shutdown, task }
}
