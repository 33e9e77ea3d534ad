//! Cache facade: the only cache type other subsystems call.
//!
//! Composes the entry store, dependency graph and sweeper behind one
//! `RwLock`. Reads take the read lock; every mutation, including a whole
//! cascade walk or sweep, runs under the write lock, so no reader can observe
//! a deleted ancestor next to a live dependent.

use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant as WallInstant};

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::graph::{self, DependencyView};
use super::keys::{CacheKey, KeyPattern};
use super::lock::{rw_read, rw_write};
use super::store::{EntryStore, Payload};
use super::sweep::{self, SweepReport};

const SOURCE: &str = "cache::manager";

const METRIC_CACHE_HIT: &str = "newsroom_cache_hit_total";
const METRIC_CACHE_MISS: &str = "newsroom_cache_miss_total";
const METRIC_CACHE_SET: &str = "newsroom_cache_set_total";
const METRIC_CACHE_DELETE: &str = "newsroom_cache_delete_total";
const METRIC_CACHE_REGISTRATION: &str = "newsroom_cache_dependency_registration_total";
const METRIC_CACHE_CASCADE: &str = "newsroom_cache_cascade_total";
const METRIC_CACHE_EXPIRED: &str = "newsroom_cache_expired_total";
const METRIC_CACHE_ORPHAN: &str = "newsroom_cache_orphan_total";
const METRIC_CACHE_ENTRIES: &str = "newsroom_cache_entries";
const METRIC_CACHE_SWEEP_MS: &str = "newsroom_cache_sweep_ms";

/// Snapshot of cache counters. All counters only ever grow for the lifetime
/// of one cache instance; `entries` is the current physical size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheTelemetry {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub cascade_invalidations: u64,
    pub dependency_registrations: u64,
    pub expired: u64,
    pub orphans_reclaimed: u64,
    pub entries: usize,
}

impl CacheTelemetry {
    /// `hits / (hits + misses)`, `0.0` before any read.
    pub fn hit_rate(&self) -> f64 {
        let reads = self.hits + self.misses;
        if reads == 0 {
            0.0
        } else {
            self.hits as f64 / reads as f64
        }
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    cascade_invalidations: AtomicU64,
    dependency_registrations: AtomicU64,
    expired: AtomicU64,
    orphans_reclaimed: AtomicU64,
}

impl Counters {
    fn add(counter: &AtomicU64, metric: &'static str, amount: u64) {
        if amount == 0 {
            return;
        }
        counter.fetch_add(amount, Ordering::Relaxed);
        counter!(metric).increment(amount);
    }
}

/// In-process response cache with TTL expiry and cascade invalidation.
///
/// Construct one per process and share it as `Arc<ContentCache>`.
#[derive(Default)]
pub struct ContentCache {
    store: RwLock<EntryStore>,
    counters: Counters,
    sweeping: AtomicBool,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live value at `key`.
    ///
    /// Absent, expired, and wrongly-typed entries are all misses.
    pub fn get<T>(&self, key: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let payload = rw_read(&self.store, SOURCE, "get")
            .get(key)
            .map(|entry| Arc::clone(entry.value()));

        let value = payload.and_then(|payload| match payload.downcast::<T>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(
                    target = "newsroom::cache",
                    key,
                    expected = std::any::type_name::<T>(),
                    "cached value has a different type; treating as miss"
                );
                None
            }
        });

        if value.is_some() {
            Counters::add(&self.counters.hits, METRIC_CACHE_HIT, 1);
        } else {
            Counters::add(&self.counters.misses, METRIC_CACHE_MISS, 1);
        }
        value
    }

    /// Whether a live entry exists at `key`. Does not touch hit/miss counters.
    pub fn contains(&self, key: &str) -> bool {
        rw_read(&self.store, SOURCE, "contains").get(key).is_some()
    }

    /// Insert or replace `key`, then register `deps` as its dependencies.
    ///
    /// Replacing drops the previous entry's edges; they must be passed again
    /// if still relevant.
    pub fn set<T, I, K>(&self, key: impl Into<CacheKey>, value: T, ttl: Duration, deps: I)
    where
        T: Any + Send + Sync,
        I: IntoIterator<Item = K>,
        K: Into<CacheKey>,
    {
        self.insert(key.into(), Arc::new(value), ttl, collect_keys(deps));
    }

    /// Like [`set`](Self::set) for a value that is already shared.
    pub fn set_shared<T, I, K>(&self, key: impl Into<CacheKey>, value: Arc<T>, ttl: Duration, deps: I)
    where
        T: Any + Send + Sync,
        I: IntoIterator<Item = K>,
        K: Into<CacheKey>,
    {
        self.insert(key.into(), value, ttl, collect_keys(deps));
    }

    fn insert(&self, key: CacheKey, value: Payload, ttl: Duration, deps: Vec<CacheKey>) {
        let entries = {
            let mut store = rw_write(&self.store, SOURCE, "set");
            if let Some(replaced) = store.set(key.clone(), value, ttl) {
                graph::detach(&mut store, &key, &replaced);
            }
            if !deps.is_empty() && graph::register_dependencies(&mut store, &key, deps.iter()) {
                Counters::add(
                    &self.counters.dependency_registrations,
                    METRIC_CACHE_REGISTRATION,
                    1,
                );
            }
            store.len()
        };

        Counters::add(&self.counters.sets, METRIC_CACHE_SET, 1);
        gauge!(METRIC_CACHE_ENTRIES).set(entries as f64);
        debug!(
            target = "newsroom::cache",
            key = %key,
            ttl_ms = ttl.as_millis() as u64,
            dependencies = deps.len(),
            "cache entry stored"
        );
    }

    /// Register `deps` for an existing `key`. Returns `false` (and changes
    /// nothing) when `key` is absent.
    pub fn register_dependencies<I, K>(&self, key: &str, deps: I) -> bool
    where
        I: IntoIterator<Item = K>,
        K: Into<CacheKey>,
    {
        let key = CacheKey::from(key);
        let registered = {
            let mut store = rw_write(&self.store, SOURCE, "register_dependencies");
            graph::register_dependencies(&mut store, &key, deps)
        };
        if registered {
            Counters::add(
                &self.counters.dependency_registrations,
                METRIC_CACHE_REGISTRATION,
                1,
            );
        }
        registered
    }

    /// Delete `key` and all transitive dependents. Returns how many entries
    /// were deleted (0 when `key` is absent).
    pub fn invalidate(&self, key: &str) -> usize {
        let root = CacheKey::from(key);
        let deleted = {
            let mut store = rw_write(&self.store, SOURCE, "invalidate");
            self.cascade(&mut store, &root)
        };

        if deleted > 0 {
            info!(
                target = "newsroom::cache",
                key = %root,
                deleted,
                cascaded = deleted - 1,
                "cache key invalidated"
            );
        }
        deleted
    }

    /// Invalidate every key matching `pattern`, each with its own cascade.
    ///
    /// Keys already removed by an earlier cascade in the same call are
    /// skipped. Returns the total number of entries deleted.
    pub fn invalidate_pattern(&self, pattern: &KeyPattern) -> usize {
        let (roots, deleted) = {
            let mut store = rw_write(&self.store, SOURCE, "invalidate_pattern");
            let roots: Vec<CacheKey> = store
                .keys()
                .into_iter()
                .filter(|key| pattern.matches(key))
                .collect();
            let deleted = roots
                .iter()
                .map(|root| self.cascade(&mut store, root))
                .sum::<usize>();
            (roots.len(), deleted)
        };

        info!(
            target = "newsroom::cache",
            pattern = %pattern,
            matched = roots,
            deleted,
            "cache pattern invalidated"
        );
        deleted
    }

    fn cascade(&self, store: &mut EntryStore, root: &CacheKey) -> usize {
        let deleted = graph::invalidate(store, root, |_, depth| {
            Counters::add(&self.counters.deletes, METRIC_CACHE_DELETE, 1);
            if depth > 0 {
                Counters::add(
                    &self.counters.cascade_invalidations,
                    METRIC_CACHE_CASCADE,
                    1,
                );
            }
        });
        gauge!(METRIC_CACHE_ENTRIES).set(store.len() as f64);
        deleted.len()
    }

    /// Remove entries without cascading: everything when `pattern` is `None`,
    /// otherwise only matching keys. Edges left dangling in surviving entries
    /// are reclaimed by the next sweep.
    pub fn clear(&self, pattern: Option<&KeyPattern>) -> usize {
        let (cleared, remaining) = {
            let mut store = rw_write(&self.store, SOURCE, "clear");
            let cleared = match pattern {
                None => store.clear(),
                Some(pattern) => {
                    let doomed: Vec<CacheKey> = store
                        .keys()
                        .into_iter()
                        .filter(|key| pattern.matches(key))
                        .collect();
                    doomed.iter().filter(|key| store.delete(key.as_str())).count()
                }
            };
            (cleared, store.len())
        };

        Counters::add(&self.counters.deletes, METRIC_CACHE_DELETE, cleared as u64);
        gauge!(METRIC_CACHE_ENTRIES).set(remaining as f64);
        let scope = pattern
            .map(ToString::to_string)
            .unwrap_or_else(|| "*".to_string());
        info!(
            target = "newsroom::cache",
            pattern = %scope,
            cleared,
            "cache cleared"
        );
        cleared
    }

    /// Edges of `key`; empty when absent.
    pub fn dependencies(&self, key: &str) -> DependencyView {
        graph::dependencies(&rw_read(&self.store, SOURCE, "dependencies"), key)
    }

    /// Remove expired entries, then reclaim orphan edges. Waits for the
    /// write lock; see [`try_sweep`](Self::try_sweep) for the non-overlapping
    /// variant the background task uses.
    pub fn sweep_all(&self) -> SweepReport {
        let started_at = WallInstant::now();
        let (report, remaining) = {
            let mut store = rw_write(&self.store, SOURCE, "sweep_all");
            let report = sweep::sweep_all(&mut store, Instant::now());
            (report, store.len())
        };

        Counters::add(
            &self.counters.expired,
            METRIC_CACHE_EXPIRED,
            report.expired as u64,
        );
        Counters::add(
            &self.counters.orphans_reclaimed,
            METRIC_CACHE_ORPHAN,
            report.orphans as u64,
        );
        gauge!(METRIC_CACHE_ENTRIES).set(remaining as f64);
        histogram!(METRIC_CACHE_SWEEP_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        if report.total > 0 {
            info!(
                target = "newsroom::cache::sweep",
                expired = report.expired,
                orphans = report.orphans,
                remaining,
                "cache sweep reclaimed entries"
            );
        } else {
            debug!(target = "newsroom::cache::sweep", remaining, "cache sweep found nothing");
        }
        report
    }

    /// Run [`sweep_all`](Self::sweep_all) unless another sweep is in progress.
    pub fn try_sweep(&self) -> Option<SweepReport> {
        if self
            .sweeping
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(
                target = "newsroom::cache::sweep",
                "sweep skipped: previous sweep still running"
            );
            return None;
        }

        let _busy = SweepGuard(&self.sweeping);
        Some(self.sweep_all())
    }

    /// Whether a sweep is currently running.
    pub fn is_sweeping(&self) -> bool {
        self.sweeping.load(Ordering::Acquire)
    }

    /// Return the live value at `key`, or await `fetch`, cache its `Ok` value
    /// under `ttl` and `deps`, and return it.
    ///
    /// Fetch errors are returned untouched and nothing is cached. No lock is
    /// held while `fetch` runs, so concurrent misses may fetch twice; the last
    /// writer wins.
    pub async fn get_or_fetch<T, E, I, K, F, Fut>(
        &self,
        key: impl Into<CacheKey>,
        ttl: Duration,
        deps: I,
        fetch: F,
    ) -> Result<Arc<T>, E>
    where
        T: Any + Send + Sync,
        I: IntoIterator<Item = K>,
        K: Into<CacheKey>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = key.into();
        if let Some(value) = self.get::<T>(key.as_str()) {
            return Ok(value);
        }

        let deps = collect_keys(deps);
        let value = Arc::new(fetch().await?);
        self.insert(key, Arc::clone(&value) as Payload, ttl, deps);
        Ok(value)
    }

    pub fn stats(&self) -> CacheTelemetry {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        CacheTelemetry {
            hits: load(&self.counters.hits),
            misses: load(&self.counters.misses),
            sets: load(&self.counters.sets),
            deletes: load(&self.counters.deletes),
            cascade_invalidations: load(&self.counters.cascade_invalidations),
            dependency_registrations: load(&self.counters.dependency_registrations),
            expired: load(&self.counters.expired),
            orphans_reclaimed: load(&self.counters.orphans_reclaimed),
            entries: self.len(),
        }
    }

    /// Physically present entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        rw_read(&self.store, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<CacheKey> {
        rw_read(&self.store, SOURCE, "keys").keys()
    }
}

struct SweepGuard<'a>(&'a AtomicBool);

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn collect_keys<I, K>(deps: I) -> Vec<CacheKey>
where
    I: IntoIterator<Item = K>,
    K: Into<CacheKey>,
{
    deps.into_iter().map(Into::into).collect()
}
