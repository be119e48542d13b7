//! Correlation and propagation fabric.
//!
//! # Data Flow
//! ```text
//! Inbound request headers
//!     → carrier.rs (extract traceparent + baggage)
//!     → sampler.rs (record/sample decision, parent-based)
//!     → tracer.rs (root span under the extracted context)
//!     → scope.rs (request-scoped handle: child spans, baggage, logs)
//!     → logger.rs / recorder.rs (every emission tagged with trace ids)
//!     → carrier.rs (re-inject into response / outbound headers)
//!
//! Finished spans, logs, metrics:
//!     → export.rs (bounded drop-oldest sink → background exporter)
//! ```
//!
//! # Design Decisions
//! - No failure in this module may abort or alter the business request it
//!   observes: headers fail soft, overflow truncates, exports drop
//! - Context and baggage are immutable values passed explicitly; there is
//!   no process-wide mutable propagation state

pub mod baggage;
pub mod carrier;
pub mod context;
pub mod error;
pub mod export;
pub mod logger;
pub mod recorder;
pub mod sampler;
pub mod scope;
pub mod span;
pub mod tracer;

pub use baggage::{Baggage, BaggageEntry};
pub use context::{SpanId, TraceContext, TraceFlags, TraceId};
pub use error::TelemetryError;
pub use export::{Exporter, InMemoryExporter, LogExporter, TelemetryItem, TelemetrySink};
pub use logger::{CorrelatedLogger, LogRecord, Severity};
pub use recorder::MetricsRecorder;
pub use sampler::{AlwaysOff, AlwaysOn, ParentBased, RootSampler, SamplingDecision, TraceIdRatio};
pub use scope::RequestScope;
pub use span::{AttrValue, Attributes, Span, SpanEvent, SpanKind, SpanStatus};
pub use tracer::{SpanHandle, Telemetry};
