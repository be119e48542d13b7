//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → shared via Arc<ArcSwap> to all subsystems
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the shared handle
//!     → subsystems observe new config (sampling ratio applies live)
//! ```
//!
//! # Design Decisions
//! - Config values are immutable once loaded; changes swap the whole value
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::telemetry::{RootSampler, SamplingDecision, TraceIdRatio};
use crate::telemetry::{Attributes, TraceId};

pub use loader::{load_config, ConfigError};
pub use schema::{
    AuthConfig, ExportConfig, ListenerConfig, ObservabilityConfig, SamplingConfig, SamplingMode,
    ServiceConfig, TelemetryConfig, TimeoutConfig, TokenEntry,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;

/// Shared, hot-swappable configuration handle.
pub type SharedConfig = Arc<ArcSwap<ServiceConfig>>;

pub fn shared(config: ServiceConfig) -> SharedConfig {
    Arc::new(ArcSwap::from_pointee(config))
}

/// Root sampling policy that reads the live configuration on every
/// decision, so a config reload changes sampling without a restart.
pub struct ConfiguredRootSampler {
    config: SharedConfig,
}

impl ConfiguredRootSampler {
    pub fn new(config: SharedConfig) -> Self {
        Self { config }
    }
}

impl RootSampler for ConfiguredRootSampler {
    fn decide(&self, trace_id: TraceId, name: &str, attributes: &Attributes) -> SamplingDecision {
        let sampling = self.config.load().telemetry.sampling.clone();
        match sampling.mode {
            SamplingMode::AlwaysOn => SamplingDecision::sampled(),
            SamplingMode::AlwaysOff => SamplingDecision::local_only(),
            SamplingMode::Ratio => {
                TraceIdRatio::new(sampling.ratio).decide(trace_id, name, attributes)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reload_changes_root_decision() {
        let mut config = ServiceConfig::default();
        config.telemetry.sampling.mode = SamplingMode::AlwaysOff;
        let handle = shared(config.clone());
        let sampler = ConfiguredRootSampler::new(handle.clone());

        let id = TraceId::mint();
        assert!(!sampler.decide(id, "op", &Attributes::new()).sample);

        config.telemetry.sampling.mode = SamplingMode::AlwaysOn;
        handle.store(Arc::new(config));
        assert!(sampler.decide(id, "op", &Attributes::new()).sample);
    }
}
