//! Sampling: the per-span record/export decision.
//!
//! # Design Decisions
//! - Parent-based composite: an inbound sampled flag is inherited by every
//!   descendant span, no re-evaluation
//! - Root spans delegate to an injectable policy; the default policy is
//!   chosen by configuration, not baked in here
//! - A faulty policy (panic, invalid ratio) fails closed to not-sampled
//!   rather than flooding the sink
//! - Unsampled spans are still recorded locally so log enrichment keeps
//!   working; `record = false` drops a span entirely

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::telemetry::context::{TraceContext, TraceId};
use crate::telemetry::error::TelemetryError;
use crate::telemetry::span::Attributes;

/// Outcome of a sampling decision, made once at span start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingDecision {
    /// The span exists locally (attributes, log enrichment).
    pub record: bool,
    /// The span is handed to the exporter sink when it ends.
    pub sample: bool,
}

impl SamplingDecision {
    pub fn sampled() -> Self {
        Self {
            record: true,
            sample: true,
        }
    }

    /// Recorded for local correlation but not exported.
    pub fn local_only() -> Self {
        Self {
            record: true,
            sample: false,
        }
    }
}

/// Root sampling policy: consulted only for spans with no parent context.
pub trait RootSampler: Send + Sync {
    fn decide(&self, trace_id: TraceId, name: &str, attributes: &Attributes) -> SamplingDecision;
}

/// Samples every root span.
pub struct AlwaysOn;

impl RootSampler for AlwaysOn {
    fn decide(&self, _: TraceId, _: &str, _: &Attributes) -> SamplingDecision {
        SamplingDecision::sampled()
    }
}

/// Exports no root span; spans remain available for local log enrichment.
pub struct AlwaysOff;

impl RootSampler for AlwaysOff {
    fn decide(&self, _: TraceId, _: &str, _: &Attributes) -> SamplingDecision {
        SamplingDecision::local_only()
    }
}

/// Deterministic ratio sampling keyed on the low 64 bits of the trace id:
/// the same trace id always yields the same decision, on every replica.
pub struct TraceIdRatio {
    ratio: f64,
}

impl TraceIdRatio {
    pub fn new(ratio: f64) -> Self {
        Self { ratio }
    }
}

impl RootSampler for TraceIdRatio {
    fn decide(&self, trace_id: TraceId, _: &str, _: &Attributes) -> SamplingDecision {
        if self.ratio.is_nan() || !(0.0..=1.0).contains(&self.ratio) {
            tracing::warn!(
                ratio = self.ratio,
                error = %TelemetryError::SamplingPolicyFault(format!("ratio {} out of range", self.ratio)),
                "failing closed to not-sampled"
            );
            return SamplingDecision::local_only();
        }
        if self.ratio >= 1.0 {
            return SamplingDecision::sampled();
        }
        let threshold = (self.ratio * u64::MAX as f64) as u64;
        if trace_id.low64() < threshold {
            SamplingDecision::sampled()
        } else {
            SamplingDecision::local_only()
        }
    }
}

/// Parent-based composite sampler.
pub struct ParentBased {
    root: Arc<dyn RootSampler>,
}

impl ParentBased {
    pub fn new(root: Arc<dyn RootSampler>) -> Self {
        Self { root }
    }

    /// Decide for a span starting under `parent` (if any).
    pub fn should_sample(
        &self,
        parent: Option<&TraceContext>,
        trace_id: TraceId,
        name: &str,
        attributes: &Attributes,
    ) -> SamplingDecision {
        if let Some(parent) = parent {
            // Inherit unconditionally; descendants never re-evaluate.
            return if parent.is_sampled() {
                SamplingDecision::sampled()
            } else {
                SamplingDecision::local_only()
            };
        }

        match catch_unwind(AssertUnwindSafe(|| {
            self.root.decide(trace_id, name, attributes)
        })) {
            Ok(decision) => decision,
            Err(_) => {
                tracing::warn!(
                    span = name,
                    error = %TelemetryError::SamplingPolicyFault("root policy panicked".into()),
                    "failing closed to not-sampled"
                );
                SamplingDecision::local_only()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::context::{SpanId, TraceFlags};

    fn parent(sampled: bool) -> TraceContext {
        TraceContext::new(
            TraceId::mint(),
            SpanId::mint(),
            TraceFlags::NONE.with_sampled(sampled),
        )
    }

    #[test]
    fn test_sampled_parent_overrides_root_policy() {
        let sampler = ParentBased::new(Arc::new(AlwaysOff));
        let decision = sampler.should_sample(
            Some(&parent(true)),
            TraceId::mint(),
            "op",
            &Attributes::new(),
        );
        assert!(decision.sample);
    }

    #[test]
    fn test_unsampled_parent_overrides_root_policy() {
        let sampler = ParentBased::new(Arc::new(AlwaysOn));
        let decision = sampler.should_sample(
            Some(&parent(false)),
            TraceId::mint(),
            "op",
            &Attributes::new(),
        );
        assert!(!decision.sample);
        assert!(decision.record);
    }

    #[test]
    fn test_ratio_bounds() {
        let never = TraceIdRatio::new(0.0);
        let always = TraceIdRatio::new(1.0);
        for _ in 0..64 {
            let id = TraceId::mint();
            assert!(!never.decide(id, "op", &Attributes::new()).sample);
            assert!(always.decide(id, "op", &Attributes::new()).sample);
        }
    }

    #[test]
    fn test_ratio_is_deterministic_per_trace_id() {
        let sampler = TraceIdRatio::new(0.5);
        let id = TraceId::mint();
        let first = sampler.decide(id, "op", &Attributes::new());
        for _ in 0..8 {
            assert_eq!(sampler.decide(id, "op", &Attributes::new()), first);
        }
    }

    #[test]
    fn test_invalid_ratio_fails_closed() {
        for ratio in [f64::NAN, -0.5, 7.0] {
            let sampler = TraceIdRatio::new(ratio);
            let decision = sampler.decide(TraceId::mint(), "op", &Attributes::new());
            assert!(!decision.sample);
            assert!(decision.record);
        }
    }

    #[test]
    fn test_panicking_policy_fails_closed() {
        struct Faulty;
        impl RootSampler for Faulty {
            fn decide(&self, _: TraceId, _: &str, _: &Attributes) -> SamplingDecision {
                panic!("boom")
            }
        }
        let sampler = ParentBased::new(Arc::new(Faulty));
        let decision = sampler.should_sample(None, TraceId::mint(), "op", &Attributes::new());
        assert!(!decision.sample);
    }
}
