mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Covers:
// - Event log appends (throughput, latency)
// - Projection outcomes, rebuilds and failures
// - Decode failures and replay anomalies
// - Worker cursor position and retries
// - Operation deadlines
//
// Every metric lives on the instance's own registry, scraped via /metrics.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Event log
    pub events_appended: IntCounterVec,
    pub append_duration: HistogramVec,
    pub decode_failures: IntCounter,

    // Projection
    pub projection_events: IntCounterVec,
    pub projection_rebuilds: IntCounterVec,
    pub projection_failures: IntCounterVec,
    pub replay_anomalies: IntCounterVec,

    // Worker
    pub projection_cursor: IntGauge,
    pub retry_attempts: IntCounterVec,

    // Deadlines
    pub operation_timeouts: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let events_appended = IntCounterVec::new(
            Opts::new("events_appended_total", "Total events appended to the log"),
            &["event_type"],
        )?;
        registry.register(Box::new(events_appended.clone()))?;

        let append_duration = HistogramVec::new(
            HistogramOpts::new("event_append_duration_seconds", "Event append latency")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["event_type"],
        )?;
        registry.register(Box::new(append_duration.clone()))?;

        let decode_failures = IntCounter::new(
            "event_decode_failures_total",
            "Log reads that failed on a malformed record",
        )?;
        registry.register(Box::new(decode_failures.clone()))?;

        let projection_events = IntCounterVec::new(
            Opts::new("projection_events_total", "Events handled by the projector"),
            &["outcome"],
        )?;
        registry.register(Box::new(projection_events.clone()))?;

        let projection_rebuilds = IntCounterVec::new(
            Opts::new("projection_rebuilds_total", "Projection rows re-derived from the log"),
            &["aggregate_kind"],
        )?;
        registry.register(Box::new(projection_rebuilds.clone()))?;

        let projection_failures = IntCounterVec::new(
            Opts::new("projection_failures_total", "Events the projector could not apply"),
            &["aggregate_kind"],
        )?;
        registry.register(Box::new(projection_failures.clone()))?;

        let replay_anomalies = IntCounterVec::new(
            Opts::new("replay_anomalies_total", "Integrity anomalies found while replaying"),
            &["aggregate_kind"],
        )?;
        registry.register(Box::new(replay_anomalies.clone()))?;

        let projection_cursor = IntGauge::new(
            "projection_cursor_sequence",
            "Last log sequence projected by the worker",
        )?;
        registry.register(Box::new(projection_cursor.clone()))?;

        let retry_attempts = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Total retry attempts"),
            &["operation"],
        )?;
        registry.register(Box::new(retry_attempts.clone()))?;

        let operation_timeouts = IntCounterVec::new(
            Opts::new("operation_timeouts_total", "Operations that exceeded their deadline"),
            &["operation"],
        )?;
        registry.register(Box::new(operation_timeouts.clone()))?;

        Ok(Self {
            registry,
            events_appended,
            append_duration,
            decode_failures,
            projection_events,
            projection_rebuilds,
            projection_failures,
            replay_anomalies,
            projection_cursor,
            retry_attempts,
            operation_timeouts,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_append(&self, event_type: &str, duration_secs: f64) {
        self.events_appended.with_label_values(&[event_type]).inc();
        self.append_duration.with_label_values(&[event_type]).observe(duration_secs);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.inc();
    }

    pub fn record_projection(&self, outcome: &str) {
        self.projection_events.with_label_values(&[outcome]).inc();
    }

    pub fn record_rebuild(&self, aggregate_kind: &str) {
        self.projection_rebuilds.with_label_values(&[aggregate_kind]).inc();
    }

    pub fn record_projection_failure(&self, aggregate_kind: &str) {
        self.projection_failures.with_label_values(&[aggregate_kind]).inc();
    }

    pub fn record_anomalies(&self, aggregate_kind: &str, count: usize) {
        if count > 0 {
            self.replay_anomalies
                .with_label_values(&[aggregate_kind])
                .inc_by(count as u64);
        }
    }

    pub fn set_cursor(&self, sequence: i64) {
        self.projection_cursor.set(sequence);
    }

    pub fn record_retry_attempt(&self, operation: &str) {
        self.retry_attempts.with_label_values(&[operation]).inc();
    }

    pub fn record_timeout(&self, operation: &str) {
        self.operation_timeouts.with_label_values(&[operation]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert!(!metrics.registry.gather().is_empty());
    }

    #[test]
    fn test_record_append() {
        let metrics = Metrics::new().unwrap();
        metrics.record_append("MatchCreated", 0.002);
        metrics.record_append("MatchCreated", 0.004);

        let gathered = metrics.registry.gather();
        let appended = gathered.iter().find(|m| m.name() == "events_appended_total").unwrap();
        assert_eq!(appended.metric[0].counter.value, Some(2.0));
    }

    #[test]
    fn test_projection_outcomes_are_labelled() {
        let metrics = Metrics::new().unwrap();
        metrics.record_projection("applied");
        metrics.record_projection("skipped");
        metrics.record_projection("applied");

        let gathered = metrics.registry.gather();
        let events = gathered.iter().find(|m| m.name() == "projection_events_total").unwrap();
        assert_eq!(events.metric.len(), 2);
    }

    #[test]
    fn test_zero_anomalies_are_not_recorded() {
        let metrics = Metrics::new().unwrap();
        metrics.record_anomalies("match", 0);

        let gathered = metrics.registry.gather();
        assert!(gathered.iter().all(|m| m.name() != "replay_anomalies_total"));
    }

    #[test]
    fn test_cursor_gauge() {
        let metrics = Metrics::new().unwrap();
        metrics.set_cursor(42);

        let gathered = metrics.registry.gather();
        let cursor = gathered.iter().find(|m| m.name() == "projection_cursor_sequence").unwrap();
        assert_eq!(cursor.metric[0].gauge.value, Some(42.0));
    }
}
