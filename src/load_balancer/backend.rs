//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server and its live metrics
//! - Guard all mutable metrics with one per-backend lock
//! - Reserve and release connection slots (RAII guard)
//! - Apply health-check and proxy latency updates

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Mutable metrics of a backend, always accessed under [`Backend::metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendMetrics {
    /// Liveness as last determined by the health checker.
    pub alive: bool,
    /// Connections or requests currently in flight.
    pub active_conns: i64,
    /// Damped round-trip latency.
    pub latency: Duration,
    /// Dial and proxy failures (monotonic).
    pub error_count: u64,
}

impl Default for BackendMetrics {
    fn default() -> Self {
        Self {
            alive: true,
            active_conns: 0,
            latency: Duration::ZERO,
            error_count: 0,
        }
    }
}

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    address: String,
    weight: u32,
    metrics: Mutex<BackendMetrics>,
}

impl Backend {
    /// Create a new backend, initially alive with no recorded load.
    pub fn new(address: impl Into<String>, weight: u32) -> Self {
        Self::with_metrics(address, weight, BackendMetrics::default())
    }

    /// Create a backend with explicit starting metrics.
    pub fn with_metrics(address: impl Into<String>, weight: u32, metrics: BackendMetrics) -> Self {
        Self {
            address: address.into(),
            weight,
            metrics: Mutex::new(metrics),
        }
    }

    /// Network location (host:port).
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Reserved for weighted strategies; no strategy consumes it yet.
    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Lock the metrics for a read-modify-write sequence.
    ///
    /// Never hold the guard across an `.await`.
    pub fn metrics(&self) -> MutexGuard<'_, BackendMetrics> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_alive(&self) -> bool {
        self.metrics().alive
    }

    pub fn active_connections(&self) -> i64 {
        self.metrics().active_conns
    }

    pub fn latency(&self) -> Duration {
        self.metrics().latency
    }

    pub fn error_count(&self) -> u64 {
        self.metrics().error_count
    }

    /// Increment the in-flight count.
    pub fn inc_connections(&self) {
        self.metrics().active_conns += 1;
    }

    /// Claim a slot only if the backend is alive, in one critical section.
    pub fn try_reserve(&self) -> bool {
        let mut m = self.metrics();
        if !m.alive {
            return false;
        }
        m.active_conns += 1;
        true
    }

    /// Health probe failed.
    ///
    /// Returns true if this call flipped the backend from alive to dead.
    pub fn mark_down(&self) -> bool {
        let mut m = self.metrics();
        let was_alive = m.alive;
        m.alive = false;
        was_alive
    }

    /// Health probe succeeded; the probe latency replaces the stored one.
    ///
    /// Returns true if this call flipped the backend from dead to alive.
    pub fn mark_up(&self, probe_latency: Duration) -> bool {
        let mut m = self.metrics();
        let was_dead = !m.alive;
        m.alive = true;
        m.latency = probe_latency;
        was_dead
    }

    /// Consistent copy of the metrics for reporting.
    pub fn snapshot(&self) -> BackendSnapshot {
        let m = *self.metrics();
        BackendSnapshot {
            address: self.address.clone(),
            weight: self.weight,
            alive: m.alive,
            active_conns: m.active_conns,
            latency_ms: m.latency.as_secs_f64() * 1000.0,
            error_count: m.error_count,
        }
    }
}

/// Serializable point-in-time view of a backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendSnapshot {
    pub address: String,
    pub weight: u32,
    pub alive: bool,
    pub active_conns: i64,
    pub latency_ms: f64,
    pub error_count: u64,
}

/// Result of a strategy choosing a backend.
///
/// `reserved` records whether the strategy already claimed a connection
/// slot while selecting, so the slot is counted exactly once.
#[derive(Debug, Clone)]
#[must_use = "a reserved selection leaks its slot unless turned into a guard"]
pub struct Selection {
    backend: Arc<Backend>,
    reserved: bool,
}

impl Selection {
    /// Selection that has not touched the connection count.
    pub fn new(backend: Arc<Backend>) -> Self {
        Self { backend, reserved: false }
    }

    /// Selection whose slot was already claimed by the strategy.
    pub fn reserved(backend: Arc<Backend>) -> Self {
        Self { backend, reserved: true }
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved
    }

    pub fn address(&self) -> &str {
        self.backend.address()
    }

    /// Start accounting for a connection that began at `started`.
    pub fn into_guard(self, started: Instant) -> BackendConnectionGuard {
        if !self.reserved {
            self.backend.inc_connections();
        }
        BackendConnectionGuard {
            backend: self.backend,
            started,
            dial_failed: false,
        }
    }
}

/// A RAII guard that owns one unit of a backend's `active_conns`.
///
/// On drop the count is decremented. A completed connection also folds
/// its elapsed time into the latency as `(latency + elapsed) / 2`; a
/// failed dial instead bumps the error count.
#[derive(Debug)]
pub struct BackendConnectionGuard {
    backend: Arc<Backend>,
    started: Instant,
    dial_failed: bool,
}

impl BackendConnectionGuard {
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    pub fn address(&self) -> &str {
        self.backend.address()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Release the slot after a failed dial.
    pub fn fail_dial(mut self) {
        self.dial_failed = true;
    }
}

impl Drop for BackendConnectionGuard {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        let mut m = self.backend.metrics();
        m.active_conns -= 1;
        if self.dial_failed {
            m.error_count += 1;
        } else {
            m.latency = (m.latency + elapsed) / 2;
        }
    }
}
