use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

/// Register descriptions for every metric the cache emits. Idempotent.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "newsroom_cache_hit_total",
            Unit::Count,
            "Total number of cache reads that returned a live value."
        );
        describe_counter!(
            "newsroom_cache_miss_total",
            Unit::Count,
            "Total number of cache reads that found nothing live."
        );
        describe_counter!(
            "newsroom_cache_set_total",
            Unit::Count,
            "Total number of cache writes."
        );
        describe_counter!(
            "newsroom_cache_delete_total",
            Unit::Count,
            "Total number of entries removed by invalidation or clear."
        );
        describe_counter!(
            "newsroom_cache_cascade_total",
            Unit::Count,
            "Total number of entries removed as dependents of an invalidated key."
        );
        describe_counter!(
            "newsroom_cache_dependency_registration_total",
            Unit::Count,
            "Total number of dependency registrations."
        );
        describe_counter!(
            "newsroom_cache_expired_total",
            Unit::Count,
            "Total number of expired entries removed by the sweeper."
        );
        describe_counter!(
            "newsroom_cache_orphan_total",
            Unit::Count,
            "Total number of dangling dependency references reclaimed."
        );
        describe_gauge!(
            "newsroom_cache_entries",
            Unit::Count,
            "Entries physically present in the cache."
        );
        describe_histogram!(
            "newsroom_cache_sweep_ms",
            Unit::Milliseconds,
            "Cache sweep latency in milliseconds."
        );
        describe_histogram!(
            "newsroom_cache_warm_ms",
            Unit::Milliseconds,
            "Cache warm phase latency in milliseconds."
        );
    });
}
