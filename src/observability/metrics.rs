//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_sync_passes_total` (counter): passes by listener, outcome
//! - `lb_sync_pass_duration_seconds` (histogram): pass latency by listener
//! - `lb_sync_backends_added_total` (counter): backends created by listener
//! - `lb_sync_backends_deleted_total` (counter): backends removed by listener
//! - `lb_sync_nodes_skipped_total` (counter): desired nodes without an address
//! - `lb_sync_registered_backends` (gauge): pool size seen by the last list
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::reconcile::{ReconcileError, ReconcileReport};
use crate::registry::ListenerRef;

pub mod names {
    pub const PASSES_TOTAL: &str = "lb_sync_passes_total";
    pub const PASS_DURATION_SECONDS: &str = "lb_sync_pass_duration_seconds";
    pub const BACKENDS_ADDED_TOTAL: &str = "lb_sync_backends_added_total";
    pub const BACKENDS_DELETED_TOTAL: &str = "lb_sync_backends_deleted_total";
    pub const NODES_SKIPPED_TOTAL: &str = "lb_sync_nodes_skipped_total";
    pub const REGISTERED_BACKENDS: &str = "lb_sync_registered_backends";
}

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus exporter"),
    }
}

/// Record the outcome of one reconciliation pass.
pub fn record_pass(listener: &ListenerRef, result: &Result<ReconcileReport, ReconcileError>, start: Instant) {
    let label = listener.to_string();
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => e.phase().as_str(),
    };

    counter!(names::PASSES_TOTAL, "listener" => label.clone(), "outcome" => outcome).increment(1);
    histogram!(names::PASS_DURATION_SECONDS, "listener" => label.clone())
        .record(start.elapsed().as_secs_f64());

    if let Ok(report) = result {
        counter!(names::BACKENDS_ADDED_TOTAL, "listener" => label.clone()).increment(report.added as u64);
        counter!(names::BACKENDS_DELETED_TOTAL, "listener" => label.clone()).increment(report.deleted as u64);
        counter!(names::NODES_SKIPPED_TOTAL, "listener" => label).increment(report.skipped as u64);
    }
}

/// Record how many backends the registry reported for a listener.
pub fn record_registered_backends(listener: &ListenerRef, count: usize) {
    gauge!(names::REGISTERED_BACKENDS, "listener" => listener.to_string()).set(count as f64);
}
