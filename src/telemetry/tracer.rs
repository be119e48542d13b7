//! Span creation, hierarchy and lifecycle enforcement.
//!
//! # Data Flow
//! ```text
//! carrier.rs extract
//!     → Telemetry::start_span (sampler decision, fresh ids)
//!     → SpanHandle (attributes, events, end-once enforcement)
//!     → export.rs sink on end (sampled spans only)
//! ```
//!
//! # Design Decisions
//! - `Telemetry` is constructed once at startup and passed by handle;
//!   there is no global provider singleton
//! - Sampling decisions are made at span start and immutable afterwards
//! - Ending a span twice is a warned no-op, never a panic

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::telemetry::context::TraceContext;
use crate::telemetry::error::TelemetryError;
use crate::telemetry::export::{TelemetryItem, TelemetrySink};
use crate::telemetry::logger::CorrelatedLogger;
use crate::telemetry::recorder::MetricsRecorder;
use crate::telemetry::sampler::{ParentBased, RootSampler, SamplingDecision};
use crate::telemetry::span::{AttrValue, Attributes, Span, SpanEvent, SpanKind, SpanStatus};

/// The correlation fabric's root object: sampler + sink + emitters.
///
/// Cheap to clone; every clone shares the same sink and sampler.
#[derive(Clone)]
pub struct Telemetry {
    inner: Arc<TelemetryInner>,
}

struct TelemetryInner {
    service: String,
    resource: Attributes,
    sampler: ParentBased,
    sink: Arc<TelemetrySink>,
    logger: CorrelatedLogger,
    recorder: MetricsRecorder,
}

impl Telemetry {
    pub fn new(
        service: impl Into<String>,
        resource: Attributes,
        root_sampler: Arc<dyn RootSampler>,
        sink: Arc<TelemetrySink>,
    ) -> Self {
        let service = service.into();
        Self {
            inner: Arc::new(TelemetryInner {
                logger: CorrelatedLogger::new(sink.clone(), service.clone()),
                recorder: MetricsRecorder::new(sink.clone()),
                sampler: ParentBased::new(root_sampler),
                sink,
                resource,
                service,
            }),
        }
    }

    pub fn service(&self) -> &str {
        &self.inner.service
    }

    pub fn sink(&self) -> &Arc<TelemetrySink> {
        &self.inner.sink
    }

    pub fn logger(&self) -> &CorrelatedLogger {
        &self.inner.logger
    }

    pub fn recorder(&self) -> &MetricsRecorder {
        &self.inner.recorder
    }

    /// Start a span. With a parent context the span joins that trace;
    /// without one it mints a fresh trace id and becomes a root.
    pub fn start_span(
        &self,
        name: impl Into<String>,
        parent: Option<&TraceContext>,
        kind: SpanKind,
        attributes: Attributes,
    ) -> SpanHandle {
        let name = name.into();
        let context = match parent {
            Some(p) => p.child(),
            None => TraceContext::root(),
        };
        let decision = self
            .inner
            .sampler
            .should_sample(parent, context.trace_id, &name, &attributes);
        let context = context.with_sampled(decision.sample);

        let mut span = Span::new(
            name,
            context.trace_id,
            context.span_id,
            context.parent_span_id,
            context.flags,
            kind,
        );
        for (key, value) in &self.inner.resource {
            span.attributes.insert(key.clone(), value.clone());
        }
        span.attributes
            .insert("service.name".into(), self.inner.service.as_str().into());
        for (key, value) in attributes {
            span.set_attribute(key, value);
        }

        SpanHandle {
            inner: Arc::new(HandleInner {
                context,
                decision,
                sink: self.inner.sink.clone(),
                ended: AtomicBool::new(false),
                data: Mutex::new(span),
            }),
        }
    }
}

/// Live handle to an in-flight span. Clones share the same span; the
/// start→ended transition happens exactly once across all clones.
#[derive(Clone)]
pub struct SpanHandle {
    inner: Arc<HandleInner>,
}

struct HandleInner {
    context: TraceContext,
    decision: SamplingDecision,
    sink: Arc<TelemetrySink>,
    ended: AtomicBool,
    data: Mutex<Span>,
}

impl SpanHandle {
    /// The immutable context of this span, as injected downstream.
    pub fn context(&self) -> TraceContext {
        self.inner.context
    }

    pub fn decision(&self) -> SamplingDecision {
        self.inner.decision
    }

    pub fn is_ended(&self) -> bool {
        self.inner.ended.load(Ordering::SeqCst)
    }

    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<AttrValue>) {
        if self.is_ended() {
            return;
        }
        self.inner.data.lock().unwrap().set_attribute(key, value);
    }

    pub fn add_event(&self, event: SpanEvent) {
        if self.is_ended() {
            return;
        }
        self.inner.data.lock().unwrap().add_event(event);
    }

    /// Record an error as an event and set the span status accordingly.
    pub fn record_error(&self, error: &dyn std::error::Error) {
        if self.is_ended() {
            return;
        }
        let mut data = self.inner.data.lock().unwrap();
        data.add_event(
            SpanEvent::new("exception").with_attribute("exception.message", error.to_string()),
        );
        data.status = SpanStatus::Error {
            message: error.to_string(),
        };
    }

    /// End the span: sets the end time, finalizes the status and hands the
    /// finished span to the sink. Ending twice is a warned no-op.
    pub fn end(&self, status: SpanStatus) {
        if self.inner.ended.swap(true, Ordering::SeqCst) {
            let name = self.inner.data.lock().unwrap().name.clone();
            tracing::warn!(
                span = %name,
                span_id = %self.inner.context.span_id,
                error = %TelemetryError::SpanLifecycleViolation("span ended twice".into()),
                "ignoring duplicate end"
            );
            return;
        }
        self.seal(status);
    }

    /// Force-end an abandoned span as cancelled. Silent when the span
    /// already ended normally.
    pub(crate) fn force_cancel(&self) {
        if self.inner.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        self.seal(SpanStatus::Cancelled);
    }

    fn seal(&self, status: SpanStatus) {
        let finished = {
            let mut data = self.inner.data.lock().unwrap();
            data.end_time = Some(SystemTime::now());
            // An error status recorded mid-flight survives an Unset end.
            if !(matches!(status, SpanStatus::Unset)
                && matches!(data.status, SpanStatus::Error { .. }))
            {
                data.status = status;
            }
            data.clone()
        };
        if self.inner.decision.sample {
            self.inner.sink.submit(TelemetryItem::Span(finished));
        }
    }

    #[cfg(test)]
    pub(crate) fn data(&self) -> Span {
        self.inner.data.lock().unwrap().clone()
    }
}
