//! Cache configuration.
//!
//! Controls the background sweeper and the per-resource TTL table via the
//! `[cache]` and `[cache.ttl]` sections of `newsroom.toml`.

use std::time::Duration;

use serde::Deserialize;

use super::keys::{CacheKey, ResourceKind};

const DEFAULT_SWEEP_INTERVAL_MS: u64 = 60_000;

const DEFAULT_POST_LIST_TTL_SECS: u64 = 300;
const DEFAULT_POST_TTL_SECS: u64 = 900;
const DEFAULT_PAGE_TTL_SECS: u64 = 900;
const DEFAULT_TAXONOMY_TTL_SECS: u64 = 3_600;
const DEFAULT_SEARCH_TTL_SECS: u64 = 60;
const DEFAULT_MEDIA_TTL_SECS: u64 = 86_400;
const DEFAULT_FALLBACK_TTL_SECS: u64 = 300;

/// Cache configuration from `newsroom.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Run the periodic expiry/orphan sweep.
    pub enable_background_sweep: bool,
    /// Sweep interval (ms). Independent of any entry's TTL.
    pub sweep_interval_ms: u64,
    /// Warm hot keys from the upstream source at startup.
    pub warm_on_startup: bool,
    /// TTL table consumed by callers of `set`.
    pub ttl: TtlPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_background_sweep: true,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            warm_on_startup: true,
            ttl: TtlPolicy::default(),
        }
    }
}

impl CacheConfig {
    /// Sweep interval, clamped to at least one millisecond.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

/// Per-resource-kind TTL table, in seconds.
///
/// The cache itself never consults this; callers pick the TTL they pass to
/// `set`. Post lists churn fastest, taxonomies rarely change, media never does.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TtlPolicy {
    pub post_list_secs: u64,
    pub post_secs: u64,
    pub page_secs: u64,
    /// Categories, tags and authors (single and collection keys).
    pub taxonomy_secs: u64,
    pub search_secs: u64,
    pub media_secs: u64,
    /// Keys whose prefix is not a known resource kind.
    pub default_secs: u64,
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            post_list_secs: DEFAULT_POST_LIST_TTL_SECS,
            post_secs: DEFAULT_POST_TTL_SECS,
            page_secs: DEFAULT_PAGE_TTL_SECS,
            taxonomy_secs: DEFAULT_TAXONOMY_TTL_SECS,
            search_secs: DEFAULT_SEARCH_TTL_SECS,
            media_secs: DEFAULT_MEDIA_TTL_SECS,
            default_secs: DEFAULT_FALLBACK_TTL_SECS,
        }
    }
}

impl TtlPolicy {
    pub fn ttl_for(&self, kind: ResourceKind) -> Duration {
        let secs = match kind {
            ResourceKind::PostList => self.post_list_secs,
            ResourceKind::Post => self.post_secs,
            ResourceKind::Page => self.page_secs,
            ResourceKind::Category
            | ResourceKind::Categories
            | ResourceKind::Tag
            | ResourceKind::Tags
            | ResourceKind::Author
            | ResourceKind::Authors => self.taxonomy_secs,
            ResourceKind::Search => self.search_secs,
            ResourceKind::Media => self.media_secs,
        };
        Duration::from_secs(secs)
    }

    /// TTL for a key, falling back to `default_secs` for unknown prefixes.
    pub fn ttl_for_key(&self, key: &CacheKey) -> Duration {
        key.kind()
            .map(|kind| self.ttl_for(kind))
            .unwrap_or_else(|| Duration::from_secs(self.default_secs))
    }
}
