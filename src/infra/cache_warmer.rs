use std::{sync::Arc, time::Instant};

use metrics::histogram;
use newsroom_api_types::{CacheWarmResponse, WarmFailure};
use thiserror::Error;
use tracing::{info, warn};

use crate::cache::{CacheKey, ContentCache, TtlPolicy};

use super::upstream::{ContentSource, SourceError, WarmTarget};

const METRIC_CACHE_WARM_MS: &str = "newsroom_cache_warm_ms";

#[derive(Debug, Error)]
pub enum CacheWarmError {
    #[error("no upstream content source is configured")]
    NoSource,
    #[error("failed to fetch `{key}`: {source}")]
    Source {
        key: CacheKey,
        #[source]
        source: SourceError,
    },
}

/// Pre-populates hot collections so the first visitors do not pay for a
/// cold cache.
pub struct CacheWarmer {
    cache: Arc<ContentCache>,
    source: Arc<dyn ContentSource>,
    ttl: TtlPolicy,
}

impl CacheWarmer {
    pub fn new(cache: Arc<ContentCache>, source: Arc<dyn ContentSource>, ttl: TtlPolicy) -> Self {
        Self { cache, source, ttl }
    }

    /// Fetch and store every [`WarmTarget`], in dependency order.
    ///
    /// A failing target is logged and reported; the remaining targets are
    /// still warmed.
    pub async fn warm(&self) -> CacheWarmResponse {
        info!(target = "newsroom::cache_warmer", "warming content cache");
        let started_at = Instant::now();

        let mut warmed = Vec::new();
        let mut failed = Vec::new();

        for target in WarmTarget::ORDER {
            match self.warm_target(target).await {
                Ok(key) => warmed.push(key.to_string()),
                Err(err) => {
                    warn!(
                        target = "newsroom::cache_warmer",
                        key = %target.key(),
                        error = %err,
                        "cache warm target failed"
                    );
                    failed.push(WarmFailure {
                        key: target.key().to_string(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let elapsed = started_at.elapsed();
        histogram!(METRIC_CACHE_WARM_MS).record(elapsed.as_secs_f64() * 1000.0);
        info!(
            target = "newsroom::cache_warmer",
            warmed = warmed.len(),
            failed = failed.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "content cache warmed"
        );

        CacheWarmResponse {
            warmed,
            failed,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    async fn warm_target(&self, target: WarmTarget) -> Result<CacheKey, CacheWarmError> {
        let key = target.key();
        let document = self
            .source
            .fetch(target)
            .await
            .map_err(|source| CacheWarmError::Source {
                key: key.clone(),
                source,
            })?;

        let deps = target.dependencies().iter().map(|dep| dep.key());
        self.cache
            .set(key.clone(), document, self.ttl.ttl_for(target.kind()), deps);
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use super::*;

    struct StaticSource {
        failing: HashSet<WarmTarget>,
    }

    #[async_trait]
    impl ContentSource for StaticSource {
        async fn fetch(&self, target: WarmTarget) -> Result<Value, SourceError> {
            if self.failing.contains(&target) {
                return Err(SourceError::Status {
                    url: format!("http://cms.test/{}", target.path()),
                    status: 502,
                });
            }
            Ok(json!([{ "collection": target.path() }]))
        }
    }

    fn warmer(cache: &Arc<ContentCache>, failing: &[WarmTarget]) -> CacheWarmer {
        CacheWarmer::new(
            Arc::clone(cache),
            Arc::new(StaticSource {
                failing: failing.iter().copied().collect(),
            }),
            TtlPolicy::default(),
        )
    }

    #[tokio::test]
    async fn warms_all_targets_with_dependencies() {
        let cache = Arc::new(ContentCache::new());
        let report = warmer(&cache, &[]).warm().await;

        assert_eq!(
            report.warmed,
            vec!["categories:all", "tags:all", "authors:all", "posts:all"]
        );
        assert!(report.failed.is_empty());

        let posts = cache.get::<Value>("posts:all").expect("posts warmed");
        assert_eq!(posts[0]["collection"], "posts");

        // Changing a category must drop the cached post list.
        assert_eq!(cache.invalidate("categories:all"), 2);
        assert!(!cache.contains("posts:all"));
        assert!(cache.contains("tags:all"));
    }

    #[tokio::test]
    async fn failed_target_is_reported_not_fatal() {
        let cache = Arc::new(ContentCache::new());
        let report = warmer(&cache, &[WarmTarget::Tags]).warm().await;

        assert_eq!(report.warmed, vec!["categories:all", "authors:all", "posts:all"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].key, "tags:all");
        assert!(report.failed[0].error.contains("502"));

        // The dependency on the missing key is recorded but not linked back.
        let view = cache.dependencies("posts:all");
        assert!(view.dependencies.contains(&CacheKey::from("tags:all")));
    }

    #[tokio::test]
    async fn rewarming_replaces_entries() {
        let cache = Arc::new(ContentCache::new());
        let warmer = warmer(&cache, &[]);
        warmer.warm().await;
        warmer.warm().await;

        assert_eq!(cache.len(), 4);
        assert_eq!(
            cache.dependencies("categories:all").dependents,
            vec![CacheKey::from("posts:all")]
        );
        assert_eq!(cache.stats().sets, 8);
    }
}
