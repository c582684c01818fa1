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
            "mdmirror_cache_hit_total",
            Unit::Count,
            "Total number of document cache hits."
        );
        describe_counter!(
            "mdmirror_cache_miss_total",
            Unit::Count,
            "Total number of document cache misses, expired entries included."
        );
        describe_counter!(
            "mdmirror_cache_evict_total",
            Unit::Count,
            "Total number of document cache evictions due to capacity."
        );
        describe_counter!(
            "mdmirror_document_build_total",
            Unit::Count,
            "Total number of documents rebuilt after a cache miss."
        );
        describe_histogram!(
            "mdmirror_document_build_ms",
            Unit::Milliseconds,
            "Document build latency in milliseconds."
        );
        describe_histogram!(
            "mdmirror_invalidation_ms",
            Unit::Milliseconds,
            "Invalidation plan execution latency in milliseconds."
        );
    });
}
