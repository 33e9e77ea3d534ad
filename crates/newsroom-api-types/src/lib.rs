//! Request and response types for the newsroom cache administration API.
//!
//! The server serializes these from `GET /cache`, `DELETE /cache`,
//! `POST /cache` and `POST /cache/sweep`; clients deserialize them.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Snapshot of cache telemetry returned by `GET /cache`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub cascade_invalidations: u64,
    pub dependency_registrations: u64,
    pub expired: u64,
    pub orphans_reclaimed: u64,
    /// Entries physically present, including expired ones not yet swept.
    pub entries: usize,
    /// `hits / (hits + misses)`, or `0.0` before the first read.
    pub hit_rate: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
}

/// Query string accepted by `DELETE /cache`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheClearQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// Result of `DELETE /cache`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheClearResponse {
    pub cleared: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// A warm target that could not be populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmFailure {
    pub key: String,
    pub error: String,
}

/// Result of `POST /cache`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheWarmResponse {
    pub warmed: Vec<String>,
    #[serde(default)]
    pub failed: Vec<WarmFailure>,
    pub elapsed_ms: u64,
}

/// Result of `POST /cache/sweep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSweepResponse {
    pub expired: usize,
    pub orphans: usize,
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn stats_response_uses_rfc3339_timestamps() {
        let stats = CacheStatsResponse {
            hits: 3,
            misses: 1,
            sets: 2,
            deletes: 0,
            cascade_invalidations: 0,
            dependency_registrations: 1,
            expired: 0,
            orphans_reclaimed: 0,
            entries: 2,
            hit_rate: 0.75,
            generated_at: datetime!(2026-03-01 12:00:00 UTC),
        };

        let json = serde_json::to_value(&stats).expect("serialize stats");
        assert_eq!(json["generated_at"], "2026-03-01T12:00:00Z");
        assert_eq!(json["hit_rate"], 0.75);

        let decoded: CacheStatsResponse = serde_json::from_value(json).expect("decode stats");
        assert_eq!(decoded, stats);
    }

    #[test]
    fn clear_query_pattern_is_optional() {
        let query: CacheClearQuery = serde_json::from_str("{}").expect("empty query");
        assert_eq!(query.pattern, None);

        let response = CacheClearResponse {
            cleared: 4,
            pattern: None,
        };
        let json = serde_json::to_string(&response).expect("serialize clear");
        assert_eq!(json, r#"{"cleared":4}"#);
    }
}
