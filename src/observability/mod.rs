//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers, retries and the atomic writer produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stderr)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Dashboards via BreakerRegistry::all_status
//! ```

pub mod logging;
pub mod metrics;
