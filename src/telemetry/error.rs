//! Failure taxonomy for the correlation fabric.
//!
//! None of these abort or alter the business request being observed. Callers
//! inside the telemetry subsystem degrade (absent context, truncated baggage,
//! dropped export) and log a warning instead of propagating upward.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A propagation header failed to parse. Extraction degrades to an
    /// absent context.
    #[error("malformed {header} header: {reason}")]
    MalformedHeader {
        header: &'static str,
        reason: String,
    },

    /// Baggage exceeded the entry or size cap and was truncated.
    #[error("baggage overflow: dropped {dropped} entries")]
    BaggageOverflow { dropped: usize },

    /// A span was ended twice or manipulated after ending. No-op.
    #[error("span lifecycle violation: {0}")]
    SpanLifecycleViolation(String),

    /// The exporter could not accept a batch; the batch is dropped.
    #[error("exporter unavailable: {0}")]
    ExporterUnavailable(String),

    /// The root sampling policy failed; sampling fails closed.
    #[error("sampling policy fault: {0}")]
    SamplingPolicyFault(String),
}
