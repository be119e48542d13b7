//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! service. All types derive Serde traits for deserialization from config
//! files, and every field has a default so a minimal config works.

use serde::{Deserialize, Serialize};

/// Root configuration for the todo service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Correlation fabric settings (sampling, export, resource).
    pub telemetry: TelemetryConfig,

    /// Metrics endpoint settings.
    pub observability: ObservabilityConfig,

    /// Bearer-token table for the demo verifier.
    pub auth: AuthConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Per-request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Correlation fabric settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Logical service name stamped on every span and log record.
    pub service_name: String,

    /// Deployment environment resource attribute.
    pub deployment_environment: String,

    /// Owning-team resource attribute.
    pub team_owner: String,

    /// Root sampling policy.
    pub sampling: SamplingConfig,

    /// Sink and exporter settings.
    pub export: ExportConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "todo-service".to_string(),
            deployment_environment: "development".to_string(),
            team_owner: "core-team".to_string(),
            sampling: SamplingConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

/// Root sampling policy selection. Applies only to spans without an
/// inbound parent context; a sampled parent is always honored.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub mode: SamplingMode,

    /// Fraction of root traces sampled when `mode = "ratio"`.
    pub ratio: f64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            mode: SamplingMode::Ratio,
            ratio: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    AlwaysOn,
    AlwaysOff,
    Ratio,
}

/// Telemetry sink settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Ring buffer capacity; the oldest item is dropped when full.
    pub buffer_capacity: usize,

    /// Maximum items handed to the exporter per batch.
    pub batch_size: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 2048,
            batch_size: 512,
        }
    }
}

/// Metrics endpoint settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Expose a Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Address for the scrape endpoint.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Bearer-token table for the demo verifier.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<TokenEntry>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenEntry {
    pub token: String,
    pub user_id: String,
    pub user_name: String,
}
