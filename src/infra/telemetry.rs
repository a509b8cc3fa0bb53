use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
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

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "gearcache_cache_hit_total",
            Unit::Count,
            "Total number of cache lookups served from a live entry."
        );
        describe_counter!(
            "gearcache_cache_miss_total",
            Unit::Count,
            "Total number of cache misses, labelled by reason."
        );
        describe_counter!(
            "gearcache_cache_store_error_total",
            Unit::Count,
            "Total number of degraded cache store operations, labelled by op."
        );
        describe_counter!(
            "gearcache_cache_sweep_removed_total",
            Unit::Count,
            "Total number of entries removed by the periodic sweep."
        );
        describe_counter!(
            "gearcache_producer_calls_total",
            Unit::Count,
            "Total number of producer invocations, labelled by provenance."
        );
        describe_histogram!(
            "gearcache_producer_ms",
            Unit::Milliseconds,
            "Producer call latency in milliseconds."
        );
        describe_counter!(
            "gearcache_fetch_phase_failed_total",
            Unit::Count,
            "Total number of phases that failed inside a multi-phase fetch."
        );
    });
}
