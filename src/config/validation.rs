//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, sampling ratio in [0, 1])
//! - Detect duplicate auth tokens
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function over the config
//! - Runs before a config is accepted into the system (startup and reload)

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{SamplingMode, ServiceConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate `config`, returning every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a valid socket address: {}", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new(
            "timeouts.request_secs",
            "must be greater than zero",
        ));
    }

    if config.telemetry.service_name.is_empty() {
        errors.push(ValidationError::new(
            "telemetry.service_name",
            "must not be empty",
        ));
    }

    let sampling = &config.telemetry.sampling;
    if sampling.mode == SamplingMode::Ratio
        && (sampling.ratio.is_nan() || !(0.0..=1.0).contains(&sampling.ratio))
    {
        errors.push(ValidationError::new(
            "telemetry.sampling.ratio",
            format!("must be within [0.0, 1.0], got {}", sampling.ratio),
        ));
    }

    let export = &config.telemetry.export;
    if export.buffer_capacity == 0 {
        errors.push(ValidationError::new(
            "telemetry.export.buffer_capacity",
            "must be greater than zero",
        ));
    }
    if export.batch_size == 0 {
        errors.push(ValidationError::new(
            "telemetry.export.batch_size",
            "must be greater than zero",
        ));
    } else if export.batch_size > export.buffer_capacity && export.buffer_capacity > 0 {
        errors.push(ValidationError::new(
            "telemetry.export.batch_size",
            "must not exceed buffer_capacity",
        ));
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "not a valid socket address: {}",
                config.observability.metrics_address
            ),
        ));
    }

    let mut seen_tokens = HashSet::new();
    for (i, entry) in config.auth.tokens.iter().enumerate() {
        if entry.token.is_empty() {
            errors.push(ValidationError::new(
                &format!("auth.tokens[{i}].token"),
                "must not be empty",
            ));
        } else if !seen_tokens.insert(entry.token.as_str()) {
            errors.push(ValidationError::new(
                &format!("auth.tokens[{i}].token"),
                "duplicate token",
            ));
        }
        if entry.user_id.is_empty() {
            errors.push(ValidationError::new(
                &format!("auth.tokens[{i}].user_id"),
                "must not be empty",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TokenEntry;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServiceConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServiceConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.timeouts.request_secs = 0;
        config.telemetry.sampling.ratio = 2.0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_duplicate_tokens_rejected() {
        let mut config = ServiceConfig::default();
        let entry = TokenEntry {
            token: "t".into(),
            user_id: "u".into(),
            user_name: "n".into(),
        };
        config.auth.tokens = vec![entry.clone(), entry];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.message == "duplicate token"));
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = ServiceConfig::default();
        config.observability.metrics_address = "bogus".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_batch_size_bounded_by_capacity() {
        let mut config = ServiceConfig::default();
        config.telemetry.export.buffer_capacity = 10;
        config.telemetry.export.batch_size = 100;
        assert!(validate_config(&config).is_err());
    }
}
