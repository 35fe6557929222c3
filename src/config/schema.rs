//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every field has a default, so an empty file yields a working config.

use std::collections::HashMap;
use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::persistence::PersistenceOptions;
use crate::resilience::circuit_breaker::BreakerOptions;
use crate::resilience::retries::RetryPolicy;

/// Root configuration for the substrate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SubstrateConfig {
    /// Breaker defaults applied to every dependency.
    pub breaker: BreakerConfig,

    /// Per-dependency breaker overrides, keyed by dependency name.
    pub dependencies: HashMap<String, BreakerOverride>,

    /// Retry defaults.
    pub retry: RetryConfig,

    /// Atomic persistence settings.
    pub persistence: PersistenceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl SubstrateConfig {
    /// Effective breaker options for a dependency.
    pub fn breaker_options(&self, dependency: &str) -> BreakerOptions {
        let base = &self.breaker;
        match self.dependencies.get(dependency) {
            Some(o) => BreakerOptions {
                failure_threshold: o.failure_threshold.unwrap_or(base.failure_threshold),
                cooldown: Duration::from_millis(o.cooldown_ms.unwrap_or(base.cooldown_ms)),
                exclusive_trial: o.exclusive_trial.unwrap_or(base.exclusive_trial),
            },
            None => base.into(),
        }
    }
}

/// Circuit breaker defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker.
    pub failure_threshold: u32,

    /// Time the breaker stays open before admitting a trial, in milliseconds.
    pub cooldown_ms: u64,

    /// Admit at most one half-open trial at a time.
    pub exclusive_trial: bool,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_ms: 30_000,
            exclusive_trial: false,
        }
    }
}

impl From<&BreakerConfig> for BreakerOptions {
    fn from(c: &BreakerConfig) -> Self {
        Self {
            failure_threshold: c.failure_threshold,
            cooldown: Duration::from_millis(c.cooldown_ms),
            exclusive_trial: c.exclusive_trial,
        }
    }
}

/// Partial breaker settings for one dependency.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BreakerOverride {
    pub failure_threshold: Option<u32>,
    pub cooldown_ms: Option<u64>,
    pub exclusive_trial: Option<bool>,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound of the random jitter added to each delay, in milliseconds.
    pub max_jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 1000,
            max_jitter_ms: 500,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(c: &RetryConfig) -> Self {
        RetryPolicy::new(c.max_retries, Duration::from_millis(c.base_delay_ms))
            .with_max_jitter(Duration::from_millis(c.max_jitter_ms))
    }
}

/// Atomic persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Extra wait before each write cycle so bursts coalesce, in milliseconds.
    pub debounce_ms: u64,

    /// fsync the temporary file before renaming it into place.
    pub sync_data: bool,

    /// Create missing parent directories of the destination.
    pub create_parent_dirs: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 0,
            sync_data: true,
            create_parent_dirs: true,
        }
    }
}

impl From<&PersistenceConfig> for PersistenceOptions {
    fn from(c: &PersistenceConfig) -> Self {
        Self {
            debounce: Duration::from_millis(c.debounce_ms),
            sync_data: c.sync_data,
            create_parent_dirs: c.create_parent_dirs,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Exporter bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}
