//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds and cooldowns > 0)
//! - Check the metrics exporter address when metrics are enabled
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SubstrateConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::SubstrateConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{scope}: failure_threshold must be greater than zero")]
    ZeroFailureThreshold { scope: String },

    #[error("{scope}: cooldown_ms must be greater than zero")]
    ZeroCooldown { scope: String },

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),

    #[error("observability.log_level '{0}' is not one of trace, debug, info, warn, error")]
    UnknownLogLevel(String),
}

/// Check a parsed configuration, collecting every violation.
pub fn validate_config(config: &SubstrateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.breaker.failure_threshold == 0 {
        errors.push(ValidationError::ZeroFailureThreshold { scope: "breaker".into() });
    }
    if config.breaker.cooldown_ms == 0 {
        errors.push(ValidationError::ZeroCooldown { scope: "breaker".into() });
    }

    let mut names: Vec<_> = config.dependencies.keys().collect();
    names.sort();
    for name in names {
        let o = &config.dependencies[name];
        let scope = format!("dependencies.{}", name);
        if o.failure_threshold == Some(0) {
            errors.push(ValidationError::ZeroFailureThreshold { scope: scope.clone() });
        }
        if o.cooldown_ms == Some(0) {
            errors.push(ValidationError::ZeroCooldown { scope });
        }
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidMetricsAddress(obs.metrics_address.clone()));
    }
    if !LOG_LEVELS.contains(&obs.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::UnknownLogLevel(obs.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
