//! Metrics collection and exposition.
//!
//! # Metrics
//! - `substrate_breaker_state` (gauge): 0=closed, 1=half-open, 2=open, by dependency
//! - `substrate_breaker_rejections_total` (counter): fail-fast rejections, by dependency
//! - `substrate_retry_attempts_total` (counter): backoff retries scheduled
//! - `substrate_retry_exhausted_total` (counter): operations that used up their budget
//! - `substrate_persist_writes_total` (counter): write cycles, by outcome
//! - `substrate_persist_coalesced_total` (counter): payloads superseded before writing
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder the calls are no-ops
//! - The Prometheus exporter is opt-in for host processes

use std::net::SocketAddr;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_breaker_state(name: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    gauge!("substrate_breaker_state", "dependency" => name.to_string()).set(value);
}

pub fn record_breaker_rejection(name: &str) {
    counter!("substrate_breaker_rejections_total", "dependency" => name.to_string()).increment(1);
}

pub fn record_retry_attempt() {
    counter!("substrate_retry_attempts_total").increment(1);
}

pub fn record_retry_exhausted() {
    counter!("substrate_retry_exhausted_total").increment(1);
}

pub fn record_persist_write(outcome: &'static str) {
    counter!("substrate_persist_writes_total", "outcome" => outcome).increment(1);
}

pub fn record_persist_coalesced() {
    counter!("substrate_persist_coalesced_total").increment(1);
}
