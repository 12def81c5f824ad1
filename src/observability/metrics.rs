//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define binding metrics
//! - Expose a Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `bind_requests_total` (counter): binder executions by binder, outcome
//! - `pipeline_failures_total` (counter): failed requests by pipeline stage
//! - `descriptor_cache_entries` (gauge): record types with a cached descriptor
//!
//! # Design Decisions
//! - Recording is a no-op until [`init_metrics`] installs the exporter
//! - Label values are static strings to bound cardinality

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// One binder execution; `outcome` is `ok` or `error`.
pub fn record_bind(binder: &'static str, outcome: &'static str) {
    counter!("bind_requests_total", "binder" => binder, "outcome" => outcome).increment(1);
}

/// A request that left the pipeline through the failure funnel.
pub fn record_failure(stage: &'static str) {
    counter!("pipeline_failures_total", "stage" => stage).increment(1);
}

pub fn record_descriptor_cache_size(entries: usize) {
    gauge!("descriptor_cache_entries").set(entries as f64);
}
