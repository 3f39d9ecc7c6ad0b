//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend with a bounded TCP connect
//! - Update backend liveness and latency from the result

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::load_balancer::backend::Backend;
use crate::load_balancer::pool::ServerPool;
use crate::observability::metrics;
use crate::resilience::timeouts;

pub struct HealthChecker {
    pool: Arc<ServerPool>,
    interval: Duration,
    timeout: Duration,
}

impl HealthChecker {
    pub fn new(pool: Arc<ServerPool>, interval: Duration, timeout: Duration) -> Self {
        Self { pool, interval, timeout }
    }

    pub fn from_config(pool: Arc<ServerPool>, config: &HealthCheckConfig) -> Self {
        Self::new(
            pool,
            Duration::from_millis(config.interval_ms),
            Duration::from_millis(config.timeout_ms),
        )
    }

    /// Run the checker on its own task until `shutdown` fires.
    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            timeout_ms = self.timeout.as_millis() as u64,
            "Health checker starting"
        );

        // First probe one interval after start, like a plain ticker.
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all();
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health checker received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Launch one probe per backend without waiting for them.
    fn check_all(&self) {
        for backend in self.pool.get_servers() {
            let timeout = self.timeout;
            tokio::spawn(async move {
                probe(&backend, timeout).await;
            });
        }
    }
}

/// Probe a single backend and record the outcome. Returns the new liveness.
pub async fn probe(backend: &Backend, timeout: Duration) -> bool {
    let alive = match timeouts::timed_connect(backend.address(), timeout).await {
        Ok((stream, elapsed)) => {
            drop(stream);
            if backend.mark_up(elapsed) {
                tracing::info!(addr = %backend.address(), latency_ms = elapsed.as_millis() as u64, "Backend recovered");
            }
            true
        }
        Err(e) => {
            if backend.mark_down() {
                tracing::warn!(addr = %backend.address(), error = %e, "Backend DOWN");
            } else {
                tracing::debug!(addr = %backend.address(), error = %e, "Backend still down");
            }
            false
        }
    };

    metrics::record_backend_health(backend.address(), alive);
    alive
}
