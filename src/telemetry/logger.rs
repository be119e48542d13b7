//! Correlated logging: every record carries the active trace identity.
//!
//! Log records are enriched with the active span's trace id / span id /
//! sampled flag and the contents of the active baggage, then handed to the
//! sink. With no active span the correlation fields are simply omitted.
//! Records are mirrored to the process logger so operators see them without
//! a telemetry backend.

use std::sync::Arc;
use std::time::SystemTime;

use serde::Serialize;

use crate::telemetry::baggage::Baggage;
use crate::telemetry::context::{SpanId, TraceContext, TraceId};
use crate::telemetry::export::{TelemetryItem, TelemetrySink};
use crate::telemetry::span::Attributes;

/// Log severity, ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// A structured log record as shipped to the sink.
#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub timestamp: SystemTime,
    pub severity: Severity,
    pub body: String,
    pub attributes: Attributes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<TraceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_id: Option<SpanId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampled: Option<bool>,
}

/// Emits correlated log records into the telemetry sink.
#[derive(Clone)]
pub struct CorrelatedLogger {
    sink: Arc<TelemetrySink>,
    service: String,
}

impl CorrelatedLogger {
    pub fn new(sink: Arc<TelemetrySink>, service: impl Into<String>) -> Self {
        Self {
            sink,
            service: service.into(),
        }
    }

    /// Emit a record enriched with `context` and `baggage` when present.
    pub fn emit(
        &self,
        severity: Severity,
        body: impl Into<String>,
        mut attributes: Attributes,
        context: Option<&TraceContext>,
        baggage: Option<&Baggage>,
    ) {
        let body = body.into();
        attributes.insert("service.name".into(), self.service.as_str().into());
        if let Some(baggage) = baggage {
            for (key, entry) in baggage.iter() {
                attributes.insert(key.to_string(), entry.value.as_str().into());
            }
        }

        let record = LogRecord {
            timestamp: SystemTime::now(),
            severity,
            body,
            attributes,
            trace_id: context.map(|c| c.trace_id),
            span_id: context.map(|c| c.span_id),
            sampled: context.map(|c| c.is_sampled()),
        };

        self.mirror(&record);
        self.sink.submit(TelemetryItem::Log(record));
    }

    // Operator-visible copy through the process logger.
    fn mirror(&self, record: &LogRecord) {
        let trace_id = record.trace_id.map(|t| t.to_hex()).unwrap_or_default();
        let span_id = record.span_id.map(|s| s.to_hex()).unwrap_or_default();
        match record.severity {
            Severity::Debug => tracing::debug!(%trace_id, %span_id, "{}", record.body),
            Severity::Info => tracing::info!(%trace_id, %span_id, "{}", record.body),
            Severity::Warn => tracing::warn!(%trace_id, %span_id, "{}", record.body),
            Severity::Error => tracing::error!(%trace_id, %span_id, "{}", record.body),
        }
    }
}
