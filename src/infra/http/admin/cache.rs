use axum::{
    Json,
    extract::{Query, State},
};
use newsroom_api_types::{
    CacheClearQuery, CacheClearResponse, CacheStatsResponse, CacheSweepResponse,
    CacheWarmResponse,
};
use time::OffsetDateTime;
use tracing::info;

use crate::cache::KeyPattern;
use crate::infra::cache_warmer::CacheWarmError;
use crate::infra::http::error::ApiError;

use super::AdminState;

pub(super) async fn cache_stats(State(state): State<AdminState>) -> Json<CacheStatsResponse> {
    let stats = state.cache.stats();
    Json(CacheStatsResponse {
        hits: stats.hits,
        misses: stats.misses,
        sets: stats.sets,
        deletes: stats.deletes,
        cascade_invalidations: stats.cascade_invalidations,
        dependency_registrations: stats.dependency_registrations,
        expired: stats.expired,
        orphans_reclaimed: stats.orphans_reclaimed,
        entries: stats.entries,
        hit_rate: stats.hit_rate(),
        generated_at: OffsetDateTime::now_utc(),
    })
}

/// `DELETE /cache[?pattern=prefix*]`. Never cascades.
pub(super) async fn clear_cache(
    State(state): State<AdminState>,
    Query(query): Query<CacheClearQuery>,
) -> Result<Json<CacheClearResponse>, ApiError> {
    let pattern = match query.pattern.as_deref().map(str::trim) {
        None => None,
        Some("") => {
            return Err(ApiError::bad_request(
                "Pattern must not be empty",
                Some(
                    "Omit `pattern` to clear everything, or pass a key prefix such as `posts:*`"
                        .to_string(),
                ),
            ));
        }
        Some(raw) => Some(KeyPattern::new(raw)),
    };

    let cleared = state.cache.clear(pattern.as_ref());
    info!(
        target = "newsroom::http::admin::cache",
        cleared,
        pattern = query.pattern.as_deref().unwrap_or("*"),
        "cache cleared via admin"
    );

    Ok(Json(CacheClearResponse {
        cleared,
        pattern: pattern.map(|pattern| pattern.to_string()),
    }))
}

/// `POST /cache`: warm hot collections from the upstream source.
pub(super) async fn warm_cache(
    State(state): State<AdminState>,
) -> Result<Json<CacheWarmResponse>, ApiError> {
    let warmer = state
        .warmer
        .as_ref()
        .ok_or_else(|| ApiError::upstream_unavailable(CacheWarmError::NoSource.to_string()))?;

    Ok(Json(warmer.warm().await))
}

/// `POST /cache/sweep`: one expiry and orphan pass, unless one is running.
pub(super) async fn sweep_cache(
    State(state): State<AdminState>,
) -> Result<Json<CacheSweepResponse>, ApiError> {
    let report = state
        .cache
        .try_sweep()
        .ok_or_else(ApiError::sweep_in_progress)?;

    Ok(Json(CacheSweepResponse {
        expired: report.expired,
        orphans: report.orphans,
        total: report.total,
    }))
}
