//! Entry store: the authoritative key → entry mapping.
//!
//! The store knows nothing about dependency semantics. It never repairs other
//! entries' edge sets when it removes a key; `graph` and `sweep` do that.

use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::keys::CacheKey;

/// Opaque shared payload.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// A cached value with its TTL and dependency edges.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub(crate) value: Payload,
    pub(crate) written_at: Instant,
    pub(crate) ttl: Duration,
    /// Keys this entry depends on.
    pub(crate) dependencies: BTreeSet<CacheKey>,
    /// Present keys that depend on this entry.
    pub(crate) dependents: BTreeSet<CacheKey>,
}

impl CacheEntry {
    fn new(value: Payload, ttl: Duration, now: Instant) -> Self {
        Self {
            value,
            written_at: now,
            ttl,
            dependencies: BTreeSet::new(),
            dependents: BTreeSet::new(),
        }
    }

    /// `now - written_at > ttl`. A zero TTL never yields a hit.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.ttl.is_zero() || now.saturating_duration_since(self.written_at) > self.ttl
    }

    pub fn value(&self) -> &Payload {
        &self.value
    }

    pub fn written_at(&self) -> Instant {
        self.written_at
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn dependencies(&self) -> &BTreeSet<CacheKey> {
        &self.dependencies
    }

    pub fn dependents(&self) -> &BTreeSet<CacheKey> {
        &self.dependents
    }
}

/// Key → entry map.
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: HashMap<CacheKey, CacheEntry>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live entry for `key`; `None` if absent or expired.
    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.get_at(key, Instant::now())
    }

    pub fn get_at(&self, key: &str, now: Instant) -> Option<&CacheEntry> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
    }

    /// Insert or wholly replace the entry at `key`.
    ///
    /// The new entry starts with empty edge sets. The replaced entry, if any,
    /// is returned so its outward edges can be detached by the caller.
    pub fn set(&mut self, key: CacheKey, value: Payload, ttl: Duration) -> Option<CacheEntry> {
        self.entries
            .insert(key, CacheEntry::new(value, ttl, Instant::now()))
    }

    /// Remove `key`, returning whether it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        self.remove(key).is_some()
    }

    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.entries.remove(key)
    }

    /// Physical presence, ignoring expiry.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn entry(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub(crate) fn entry_mut(&mut self, key: &str) -> Option<&mut CacheEntry> {
        self.entries.get_mut(key)
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = (&CacheKey, &mut CacheEntry)> {
        self.entries.iter_mut()
    }

    pub(crate) fn retain(&mut self, f: impl FnMut(&CacheKey, &mut CacheEntry) -> bool) {
        self.entries.retain(f);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All physically present keys, sorted.
    pub fn keys(&self) -> Vec<CacheKey> {
        let mut keys: Vec<CacheKey> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }
}
