//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SubstrateConfig (validated, immutable)
//!     → BreakerOptions / RetryPolicy / PersistenceOptions
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup; breakers keep the options they were created with
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::SubstrateConfig;
pub use schema::{BreakerConfig, BreakerOverride, ObservabilityConfig, PersistenceConfig, RetryConfig};
