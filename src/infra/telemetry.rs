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
        LogFormat::Json => fmt::layer().json().flatten_event(true).boxed(),
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
            "query_cache_hit_total",
            Unit::Count,
            "Total number of reads served from the query cache."
        );
        describe_counter!(
            "query_cache_miss_total",
            Unit::Count,
            "Total number of reads that executed the query and populated the cache."
        );
        describe_counter!(
            "query_cache_bypass_total",
            Unit::Count,
            "Total number of reads executed without the cache."
        );
        describe_counter!(
            "query_cache_flush_total",
            Unit::Count,
            "Total number of cache flushes, labelled by tag or global scope."
        );
        describe_counter!(
            "query_cache_store_error_total",
            Unit::Count,
            "Total number of failed store operations, labelled by operation."
        );
        describe_counter!(
            "query_cache_store_evict_total",
            Unit::Count,
            "Total number of memory store evictions due to capacity."
        );
        describe_histogram!(
            "query_cache_execute_ms",
            Unit::Milliseconds,
            "Query execution latency on cache misses and bypasses, in milliseconds."
        );
    });
}

#[cfg(test)]
mod tests {
    use tracing::level_filters::LevelFilter;

    use super::*;

    #[test]
    fn second_init_reports_error() {
        let logging = LoggingSettings {
            level: LevelFilter::WARN,
            format: LogFormat::Compact,
        };
        // The first call may race another test's subscriber; the second never succeeds.
        let _ = init(&logging);
        let err = init(&logging).expect_err("subscriber already installed");
        assert!(matches!(err, InfraError::Telemetry(_)));
    }

    #[test]
    fn json_format_builds_its_layer() {
        let logging = LoggingSettings {
            level: LevelFilter::INFO,
            format: LogFormat::Json,
        };
        // Only an already installed subscriber may fail the install.
        match init(&logging) {
            Ok(()) => {}
            Err(err) => assert!(err.to_string().contains("failed to install tracing subscriber")),
        }
    }
}
