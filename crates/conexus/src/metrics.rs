//! `MetricsSink` is an optional external collaborator: counters and
//! histograms for per-operation durations, per-connector outcomes, and
//! deduplication ratios. The core does not mandate a backend; a
//! `NoopMetricsSink` is provided so callers that don't care can pass
//! something.

pub trait MetricsSink: Send + Sync {
    fn record_duration(&self, operation: &str, millis: u64);
    fn record_connector_outcome(&self, connector_id: &str, succeeded: bool);
    fn record_dedup_ratio(&self, unique: usize, total: usize);
}

pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn record_duration(&self, _operation: &str, _millis: u64) {}
    fn record_connector_outcome(&self, _connector_id: &str, _succeeded: bool) {}
    fn record_dedup_ratio(&self, _unique: usize, _total: usize) {}
}

/// `tracing`-backed sink, used by the federation service's default wiring
/// so duration/outcome data is at least visible in logs even without a
/// metrics backend configured.
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn record_duration(&self, operation: &str, millis: u64) {
        tracing::debug!(operation, millis, "operation duration");
    }

    fn record_connector_outcome(&self, connector_id: &str, succeeded: bool) {
        tracing::debug!(connector_id, succeeded, "connector outcome");
    }

    fn record_dedup_ratio(&self, unique: usize, total: usize) {
        tracing::debug!(unique, total, "dedup ratio");
    }
}
