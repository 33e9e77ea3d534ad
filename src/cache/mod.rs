//! Newsroom content cache.
//!
//! An in-process key/value cache in front of every CMS fetch:
//!
//! - **Store**: key → entry, each with a fixed TTL (no sliding expiration).
//! - **Graph**: dependency edges between entries; invalidating a key deletes
//!   all of its transitive dependents.
//! - **Sweep**: removes expired entries and prunes edges to absent keys.
//! - **Manager**: [`ContentCache`], the facade everything else calls.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enable_background_sweep = true
//! sweep_interval_ms = 60000
//!
//! [cache.ttl]
//! post_list_secs = 300
//! search_secs = 60
//! # ... see config.rs for all options
//! ```

mod config;
pub mod graph;
mod keys;
mod lock;
mod manager;
mod store;
pub mod sweep;

pub use config::{CacheConfig, TtlPolicy};
pub use graph::DependencyView;
pub use keys::{CacheKey, KeyPattern, ResourceKind, hash_value};
pub use manager::{CacheTelemetry, ContentCache};
pub use store::{CacheEntry, EntryStore, Payload};
pub use sweep::{SweepReport, SweeperHandle, spawn_sweeper};
