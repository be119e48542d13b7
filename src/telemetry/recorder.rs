//! Metrics recording with bounded-cardinality dimensions.
//!
//! # Responsibilities
//! - Forward observations to the process metrics facade (Prometheus-scraped)
//! - Ship a copy to the telemetry sink with the active trace id attached
//!   exemplar-style (never as a dimension)
//! - Enforce a per-dimension distinct-value cap so caller-supplied
//!   dimensions cannot explode the series count
//!
//! Dimension values are expected to come from bounded sets (route
//! templates, status classes). A caller that passes raw entity ids gets
//! them folded into `"overflow"` past the cap instead of creating a series
//! per entity.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Serialize;

use crate::telemetry::context::{TraceContext, TraceId};
use crate::telemetry::export::{TelemetryItem, TelemetrySink};

/// Distinct values allowed per (metric, dimension) before folding.
pub const CARDINALITY_LIMIT: usize = 64;

/// Replacement value once a dimension exceeds [`CARDINALITY_LIMIT`].
pub const OVERFLOW_VALUE: &str = "overflow";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// A metric observation as shipped to the sink.
#[derive(Debug, Clone, Serialize)]
pub struct MetricObservation {
    pub name: String,
    pub kind: MetricKind,
    pub value: f64,
    pub dimensions: Vec<(String, String)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<TraceId>,
}

/// Records metric observations, bounded-cardinality enforced.
#[derive(Clone)]
pub struct MetricsRecorder {
    sink: Arc<TelemetrySink>,
    seen: Arc<DashMap<String, HashSet<String>>>,
}

impl MetricsRecorder {
    pub fn new(sink: Arc<TelemetrySink>) -> Self {
        Self {
            sink,
            seen: Arc::new(DashMap::new()),
        }
    }

    /// Increment a counter by 1.
    pub fn incr(
        &self,
        metric: &str,
        dimensions: Vec<(String, String)>,
        context: Option<&TraceContext>,
    ) {
        let dimensions = self.bound(metric, dimensions);
        metrics::counter!(metric.to_string(), &dimensions).increment(1);
        self.ship(metric, MetricKind::Counter, 1.0, dimensions, context);
    }

    /// Record a distribution value (latency, sizes).
    pub fn record(
        &self,
        metric: &str,
        value: f64,
        dimensions: Vec<(String, String)>,
        context: Option<&TraceContext>,
    ) {
        let dimensions = self.bound(metric, dimensions);
        metrics::histogram!(metric.to_string(), &dimensions).record(value);
        self.ship(metric, MetricKind::Histogram, value, dimensions, context);
    }

    /// Set a gauge to an absolute value.
    pub fn gauge(&self, metric: &str, value: f64, dimensions: Vec<(String, String)>) {
        let dimensions = self.bound(metric, dimensions);
        metrics::gauge!(metric.to_string(), &dimensions).set(value);
        self.ship(metric, MetricKind::Gauge, value, dimensions, None);
    }

    fn ship(
        &self,
        metric: &str,
        kind: MetricKind,
        value: f64,
        dimensions: Vec<(String, String)>,
        context: Option<&TraceContext>,
    ) {
        self.sink.submit(TelemetryItem::Metric(MetricObservation {
            name: metric.to_string(),
            kind,
            value,
            dimensions,
            trace_id: context.map(|c| c.trace_id),
        }));
    }

    // Fold unseen values past the cap into OVERFLOW_VALUE, per metric and
    // dimension key.
    fn bound(&self, metric: &str, dimensions: Vec<(String, String)>) -> Vec<(String, String)> {
        dimensions
            .into_iter()
            .map(|(key, value)| {
                let tracker = format!("{metric}:{key}");
                let mut values = self.seen.entry(tracker).or_default();
                if values.contains(&value) {
                    (key, value)
                } else if values.len() < CARDINALITY_LIMIT {
                    values.insert(value.clone());
                    (key, value)
                } else {
                    tracing::debug!(metric, dimension = %key, "dimension cardinality cap hit");
                    (key, OVERFLOW_VALUE.to_string())
                }
            })
            .collect()
    }
}

/// Install the Prometheus exporter and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    if let Err(error) = PrometheusBuilder::new().with_http_listener(addr).install() {
        tracing::error!(%error, %addr, "failed to install Prometheus exporter");
    } else {
        tracing::info!(%addr, "Prometheus metrics endpoint listening");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (MetricsRecorder, Arc<TelemetrySink>) {
        let sink = TelemetrySink::new(1024, 64);
        (MetricsRecorder::new(sink.clone()), sink)
    }

    fn shipped(sink: &TelemetrySink) -> Vec<MetricObservation> {
        sink.snapshot()
            .into_iter()
            .filter_map(|item| match item {
                TelemetryItem::Metric(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_bounded_dimension_passthrough() {
        let (recorder, sink) = recorder();
        recorder.incr(
            "http_requests_total",
            vec![("route".into(), "/todos".into()), ("status".into(), "2xx".into())],
            None,
        );

        let metrics = shipped(&sink);
        assert_eq!(metrics.len(), 1);
        assert_eq!(
            metrics[0].dimensions,
            vec![
                ("route".to_string(), "/todos".to_string()),
                ("status".to_string(), "2xx".to_string())
            ]
        );
    }

    #[test]
    fn test_cardinality_cap_folds_to_overflow() {
        let (recorder, sink) = recorder();
        for i in 0..CARDINALITY_LIMIT + 10 {
            recorder.incr(
                "lookups_total",
                vec![("entity_id".into(), format!("id-{i}"))],
                None,
            );
        }

        let metrics = shipped(&sink);
        let overflowed: Vec<_> = metrics
            .iter()
            .filter(|m| m.dimensions[0].1 == OVERFLOW_VALUE)
            .collect();
        assert_eq!(overflowed.len(), 10);

        // Previously seen values keep passing through.
        recorder.incr("lookups_total", vec![("entity_id".into(), "id-0".into())], None);
        let metrics = shipped(&sink);
        assert_eq!(metrics.last().unwrap().dimensions[0].1, "id-0");
    }

    #[test]
    fn test_trace_id_attached_exemplar_style() {
        let (recorder, sink) = recorder();
        let ctx = TraceContext::root();
        recorder.record("duration_ms", 12.5, Vec::new(), Some(&ctx));

        let metrics = shipped(&sink);
        assert_eq!(metrics[0].trace_id, Some(ctx.trace_id));
        assert!(metrics[0].dimensions.is_empty());
    }
}
