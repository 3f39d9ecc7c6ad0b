//! Metrics collection and exposition.
//!
//! # Metrics
//! - `lb_requests_total` (counter): finished connections/requests by mode, status, backend
//! - `lb_request_duration_seconds` (histogram): end-to-end latency
//! - `lb_decisions_total` (counter): adaptive decisions by algorithm, reason
//! - `lb_backend_health` (gauge): 1=alive, 0=dead
//! - `lb_backend_active_connections` (gauge): in-flight per backend
//! - `lb_dial_failures_total` (counter): failed dials per backend
//! - `lb_no_route_total` (counter): refused connections by mode, cause

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(mode: &'static str, status: &'static str, backend: &str, start: Instant) {
    let labels = [
        ("mode", mode.to_string()),
        ("status", status.to_string()),
        ("backend", backend.to_string()),
    ];
    counter!("lb_requests_total", &labels).increment(1);
    histogram!("lb_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_decision(algorithm: &'static str, reason: &'static str) {
    counter!("lb_decisions_total", "algorithm" => algorithm, "reason" => reason).increment(1);
}

pub fn record_backend_health(backend: &str, alive: bool) {
    gauge!("lb_backend_health", "backend" => backend.to_string()).set(if alive { 1.0 } else { 0.0 });
}

pub fn record_active_connections(backend: &str, active: i64) {
    gauge!("lb_backend_active_connections", "backend" => backend.to_string()).set(active as f64);
}

pub fn record_dial_failure(backend: &str) {
    counter!("lb_dial_failures_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_no_route(mode: &'static str, cause: &'static str) {
    counter!("lb_no_route_total", "mode" => mode, "cause" => cause).increment(1);
}
