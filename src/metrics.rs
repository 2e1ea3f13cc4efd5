//! Metrics
//!
//! Request counters reported by the HTTP layer through the `metrics`
//! facade. With a statsd sink configured the facade forwards every bucket
//! to it; without one the service uses `NullMetrics`.

use std::sync::{Arc, Once};

use metrics::{counter, describe_counter};
use metrics_exporter_statsd::StatsdBuilder;

use crate::config::MetricsSink;

/// Bucket for token creation
pub const METRIC_CREATE_TOKEN: &str = "inc.api.create_token";

/// Bucket for base increments
pub const METRIC_INCREMENT_TOKEN: &str = "inc.api.increment_token";

/// Bucket for namespaced increments
pub const METRIC_INCREMENT_NAMESPACE_TOKEN: &str = "inc.api.increment_namespace_token";

static METRICS_INIT: Once = Once::new();

/// Register bucket descriptions with the installed recorder.
///
/// Call after the recorder is installed; later calls are no-ops.
pub fn init() {
    METRICS_INIT.call_once(|| {
        describe_counter!(METRIC_CREATE_TOKEN, "Tokens issued by POST /new");
        describe_counter!(METRIC_INCREMENT_TOKEN, "Base counter increments");
        describe_counter!(
            METRIC_INCREMENT_NAMESPACE_TOKEN,
            "Namespaced counter increments"
        );
    });
}

/// Reports application metrics
pub trait MetricsCollector: Send + Sync {
    /// Count one event in `bucket`.
    fn increment(&self, bucket: &'static str);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullMetrics;

impl MetricsCollector for NullMetrics {
    fn increment(&self, _bucket: &'static str) {}
}

/// Forwards to whichever `metrics` recorder is installed.
#[derive(Debug, Default)]
pub struct RecorderMetrics;

impl MetricsCollector for RecorderMetrics {
    fn increment(&self, bucket: &'static str) {
        counter!(bucket).increment(1);
        tracing::trace!(bucket, "metric");
    }
}

/// Metrics setup errors
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Exporter could not be built
    #[error("statsd exporter: {0}")]
    Exporter(String),

    /// A global recorder is already installed
    #[error("install recorder: {0}")]
    Install(String),
}

/// Build the collector for `sink`, installing the statsd recorder if asked.
///
/// # Errors
/// Returns error if the exporter cannot be built or a recorder is already
/// installed in this process.
pub fn collector(sink: &MetricsSink) -> Result<Arc<dyn MetricsCollector>, MetricsError> {
    match sink {
        MetricsSink::Null => Ok(Arc::new(NullMetrics)),
        MetricsSink::Statsd { host, port } => {
            let recorder = StatsdBuilder::from(host.clone(), *port)
                .build(None)
                .map_err(|e| MetricsError::Exporter(e.to_string()))?;
            metrics::set_global_recorder(recorder)
                .map_err(|e| MetricsError::Install(e.to_string()))?;
            init();

            tracing::info!(host = %host, port, "statsd metrics enabled");
            Ok(Arc::new(RecorderMetrics))
        }
    }
}
