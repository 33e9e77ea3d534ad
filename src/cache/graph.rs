//! Dependency graph over cache entries.
//!
//! Edges live inside the entries as key sets, so the graph never holds a
//! reference to another entry:
//!
//! - `dependencies`: keys an entry relies on (outward).
//! - `dependents`: present keys relying on an entry (inward).
//!
//! An inverse edge is only recorded when the depended-upon key exists at
//! registration time. A dependency inserted later is not linked back, so
//! invalidating it will not reach the earlier registrant.

use std::collections::{BTreeSet, HashSet};

use super::keys::CacheKey;
use super::store::{CacheEntry, EntryStore};

/// Read-only view of one entry's edges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyView {
    pub dependencies: Vec<CacheKey>,
    pub dependents: Vec<CacheKey>,
}

/// Set `key`'s dependencies to `deps` and link `key` into every present dep's
/// `dependents`.
///
/// Returns `false` without touching the graph when `key` is absent. Edges
/// from a previous registration are replaced. Self-edges are dropped.
pub fn register_dependencies<I, K>(store: &mut EntryStore, key: &CacheKey, deps: I) -> bool
where
    I: IntoIterator<Item = K>,
    K: Into<CacheKey>,
{
    let deps: BTreeSet<CacheKey> = deps
        .into_iter()
        .map(Into::into)
        .filter(|dep| dep != key)
        .collect();

    let previous = match store.entry_mut(key.as_str()) {
        Some(entry) => std::mem::replace(&mut entry.dependencies, deps.clone()),
        None => return false,
    };

    for stale in previous.difference(&deps) {
        if let Some(entry) = store.entry_mut(stale.as_str()) {
            entry.dependents.remove(key);
        }
    }

    for dep in &deps {
        if let Some(entry) = store.entry_mut(dep.as_str()) {
            entry.dependents.insert(key.clone());
        }
    }

    true
}

/// Remove `key` from the `dependents` of everything `replaced` depended on.
///
/// Called after [`EntryStore::set`] replaces an entry, so the old wiring does
/// not outlive the old value.
pub fn detach(store: &mut EntryStore, key: &CacheKey, replaced: &CacheEntry) {
    for dep in &replaced.dependencies {
        if let Some(entry) = store.entry_mut(dep.as_str()) {
            entry.dependents.remove(key);
        }
    }
}

/// Delete `key` and every transitive dependent, depth-first pre-order.
///
/// `on_delete` runs once per deleted key, after that key is gone from the
/// store, with its depth (0 for `key` itself). Each deleted key is also
/// removed from the `dependents` of the entries it depended on. A visited
/// set guards cycles and diamonds. Returns deleted keys in deletion order;
/// empty when `key` is absent.
pub fn invalidate<F>(store: &mut EntryStore, key: &CacheKey, mut on_delete: F) -> Vec<CacheKey>
where
    F: FnMut(&CacheKey, usize),
{
    let mut deleted = Vec::new();
    let mut visited: HashSet<CacheKey> = HashSet::new();
    let mut stack = vec![(key.clone(), 0_usize)];

    while let Some((current, depth)) = stack.pop() {
        if !visited.insert(current.clone()) {
            continue;
        }
        let Some(entry) = store.remove(current.as_str()) else {
            continue;
        };

        for dep in &entry.dependencies {
            if let Some(parent) = store.entry_mut(dep.as_str()) {
                parent.dependents.remove(&current);
            }
        }

        on_delete(&current, depth);

        // Reverse push keeps children in ascending key order on pop.
        for child in entry.dependents.iter().rev() {
            if !visited.contains(child) {
                stack.push((child.clone(), depth + 1));
            }
        }
        deleted.push(current);
    }

    deleted
}

/// Edges of `key`; empty vectors when absent.
pub fn dependencies(store: &EntryStore, key: &str) -> DependencyView {
    store
        .entry(key)
        .map(|entry| DependencyView {
            dependencies: entry.dependencies.iter().cloned().collect(),
            dependents: entry.dependents.iter().cloned().collect(),
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn put(store: &mut EntryStore, key: &str) {
        store.set(key.into(), Arc::new(()), TTL);
    }

    fn keys(values: &[&str]) -> Vec<CacheKey> {
        values.iter().map(|v| CacheKey::from(*v)).collect()
    }

    #[test]
    fn register_links_present_dependencies() {
        let mut store = EntryStore::new();
        put(&mut store, "category:5");
        put(&mut store, "posts:cat=5");

        assert!(register_dependencies(
            &mut store,
            &"posts:cat=5".into(),
            ["category:5"]
        ));

        assert_eq!(
            dependencies(&store, "category:5").dependents,
            keys(&["posts:cat=5"])
        );
        assert_eq!(
            dependencies(&store, "posts:cat=5").dependencies,
            keys(&["category:5"])
        );
    }

    #[test]
    fn register_for_absent_key_is_no_op() {
        let mut store = EntryStore::new();
        put(&mut store, "a");

        assert!(!register_dependencies(&mut store, &"ghost".into(), ["a"]));
        assert!(dependencies(&store, "a").dependents.is_empty());
    }

    #[test]
    fn dependency_inserted_later_is_not_backfilled() {
        let mut store = EntryStore::new();
        put(&mut store, "b");
        register_dependencies(&mut store, &"b".into(), ["a"]);

        put(&mut store, "a");
        assert!(dependencies(&store, "a").dependents.is_empty());
        assert_eq!(dependencies(&store, "b").dependencies, keys(&["a"]));

        // Invalidating the late dependency does not reach the earlier registrant.
        let deleted = invalidate(&mut store, &"a".into(), |_, _| {});
        assert_eq!(deleted, keys(&["a"]));
        assert!(store.contains("b"));
    }

    #[test]
    fn re_registration_replaces_previous_edges() {
        let mut store = EntryStore::new();
        for key in ["x", "y", "k"] {
            put(&mut store, key);
        }
        register_dependencies(&mut store, &"k".into(), ["x"]);
        register_dependencies(&mut store, &"k".into(), ["y"]);

        assert!(dependencies(&store, "x").dependents.is_empty());
        assert_eq!(dependencies(&store, "y").dependents, keys(&["k"]));
    }

    #[test]
    fn self_edges_are_ignored() {
        let mut store = EntryStore::new();
        put(&mut store, "k");
        register_dependencies(&mut store, &"k".into(), ["k"]);
        assert_eq!(dependencies(&store, "k"), DependencyView::default());
    }

    #[test]
    fn cascade_deletes_chain_in_pre_order() {
        let mut store = EntryStore::new();
        for key in ["a", "b", "c"] {
            put(&mut store, key);
        }
        register_dependencies(&mut store, &"b".into(), ["a"]);
        register_dependencies(&mut store, &"c".into(), ["b"]);

        let mut seen = Vec::new();
        let deleted = invalidate(&mut store, &"a".into(), |key, depth| {
            seen.push((key.to_string(), depth));
        });

        assert_eq!(deleted, keys(&["a", "b", "c"]));
        assert_eq!(
            seen,
            vec![
                ("a".to_string(), 0),
                ("b".to_string(), 1),
                ("c".to_string(), 2)
            ]
        );
        assert!(store.is_empty());
    }

    #[test]
    fn cascade_visits_siblings_depth_first() {
        let mut store = EntryStore::new();
        for key in ["root", "l", "l1", "r"] {
            put(&mut store, key);
        }
        register_dependencies(&mut store, &"l".into(), ["root"]);
        register_dependencies(&mut store, &"r".into(), ["root"]);
        register_dependencies(&mut store, &"l1".into(), ["l"]);

        let deleted = invalidate(&mut store, &"root".into(), |_, _| {});
        assert_eq!(deleted, keys(&["root", "l", "l1", "r"]));
    }

    #[test]
    fn diamond_is_deleted_once() {
        let mut store = EntryStore::new();
        for key in ["a", "b", "c", "d"] {
            put(&mut store, key);
        }
        register_dependencies(&mut store, &"b".into(), ["a"]);
        register_dependencies(&mut store, &"c".into(), ["a"]);
        register_dependencies(&mut store, &"d".into(), ["b", "c"]);

        let mut calls = 0;
        let deleted = invalidate(&mut store, &"a".into(), |_, _| calls += 1);

        assert_eq!(deleted, keys(&["a", "b", "d", "c"]));
        assert_eq!(calls, 4);
    }

    #[test]
    fn cycles_terminate() {
        let mut store = EntryStore::new();
        put(&mut store, "a");
        put(&mut store, "b");
        register_dependencies(&mut store, &"b".into(), ["a"]);
        register_dependencies(&mut store, &"a".into(), ["b"]);

        let deleted = invalidate(&mut store, &"a".into(), |_, _| {});
        assert_eq!(deleted, keys(&["a", "b"]));
        assert!(store.is_empty());
    }

    #[test]
    fn cascade_prunes_edges_of_surviving_parents() {
        let mut store = EntryStore::new();
        for key in ["a", "x", "b"] {
            put(&mut store, key);
        }
        register_dependencies(&mut store, &"b".into(), ["a", "x"]);

        invalidate(&mut store, &"a".into(), |_, _| {});

        assert!(store.contains("x"));
        assert!(dependencies(&store, "x").dependents.is_empty());
    }

    #[test]
    fn invalidating_absent_key_is_no_op() {
        let mut store = EntryStore::new();
        let mut called = false;
        let deleted = invalidate(&mut store, &"missing".into(), |_, _| called = true);
        assert!(deleted.is_empty());
        assert!(!called);
    }

    #[test]
    fn detach_drops_replaced_outward_edges() {
        let mut store = EntryStore::new();
        put(&mut store, "x");
        put(&mut store, "k");
        register_dependencies(&mut store, &"k".into(), ["x"]);

        let key = CacheKey::from("k");
        let replaced = store
            .set(key.clone(), Arc::new(()), TTL)
            .expect("replaced entry");
        detach(&mut store, &key, &replaced);

        assert!(dependencies(&store, "x").dependents.is_empty());
        assert!(dependencies(&store, "k").dependencies.is_empty());
    }

    #[test]
    fn dependencies_of_absent_key_are_empty() {
        let store = EntryStore::new();
        let view = dependencies(&store, "nope");
        assert!(view.dependencies.is_empty());
        assert!(view.dependents.is_empty());
    }
}
