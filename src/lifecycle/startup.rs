//! Startup orchestration.
//!
//! # Order
//! 1. Pool from the configured backends (all start alive)
//! 2. Strategy, shared by the proxy and the admin API
//! 3. Background tasks: metrics exporter, health checker, admin API, config watcher
//! 4. The L4 or L7 proxy, last, so traffic only arrives once all is wired
//!
//! A bind failure anywhere is fatal; everything after that is per connection.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::admin::{self, AdminState};
use crate::config::watcher::{apply_backends, ConfigWatcher};
use crate::config::{LbConfig, ProxyMode};
use crate::error::LbError;
use crate::health::HealthChecker;
use crate::http::HttpProxy;
use crate::lifecycle::shutdown::{self, Shutdown};
use crate::lifecycle::signals::wait_for_signal;
use crate::load_balancer::{backend::Backend, pool::ServerPool, LoadBalancer, Strategy};
use crate::net::{Listener, TcpProxy};
use crate::observability::metrics;

/// Longest wait for background tasks once the proxy stopped.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Build the pool described by `config`.
pub fn build_pool(config: &LbConfig) -> Arc<ServerPool> {
    Arc::new(ServerPool::from_backends(
        config
            .backends
            .iter()
            .map(|b| Backend::new(b.address.clone(), b.weight)),
    ))
}

/// Wire every subsystem and serve until SIGINT/SIGTERM.
///
/// `config_path`, when given, is watched for newly added backends.
pub async fn run(config: LbConfig, config_path: Option<&Path>) -> Result<(), LbError> {
    let pool = build_pool(&config);
    let strategy = Arc::new(Strategy::from_algorithm(
        config.routing.algorithm,
        pool.clone(),
        config.routing.adaptive.clone(),
    ));

    tracing::info!(
        mode = ?config.mode,
        strategy = strategy.name(),
        backends = pool.len(),
        "Load balancer starting"
    );

    let shutdown = Shutdown::new();
    let mut background: Vec<JoinHandle<()>> = Vec::new();

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    if config.health_check.enabled {
        let checker = HealthChecker::from_config(pool.clone(), &config.health_check);
        background.push(checker.spawn(shutdown.subscribe()));
    }

    if config.admin.enabled {
        let listener = bind_tcp(&config.admin.bind_address).await?;
        let state = AdminState::new(pool.clone(), strategy.clone(), config.admin.api_key.clone());
        let stop = shutdown::recv(shutdown.subscribe());
        background.push(tokio::spawn(async move {
            if let Err(e) = admin::serve(state, listener, stop).await {
                tracing::error!(error = %e, "Admin API stopped with error");
            }
        }));
    }

    // Dropping the watcher stops notifications, so it lives until `run` returns.
    let _watcher = match config_path {
        Some(path) => spawn_config_watcher(path, pool.clone(), &shutdown),
        None => None,
    };

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            shutdown.trigger();
        });
    }

    let connect_timeout = Duration::from_millis(config.timeouts.connect_ms);
    let stop = shutdown::recv(shutdown.subscribe());
    let served = match config.mode {
        ProxyMode::L4 => {
            let listener = Listener::bind(&config.listener.bind_address, config.listener.max_connections).await?;
            TcpProxy::new(pool, strategy, connect_timeout).serve(listener, stop).await
        }
        ProxyMode::L7 => {
            let listener = bind_tcp(&config.listener.bind_address).await?;
            let request_timeout = Duration::from_secs(config.timeouts.request_secs);
            HttpProxy::new(pool, strategy, connect_timeout, request_timeout)
                .serve(listener, stop)
                .await
        }
    };

    shutdown.trigger();
    for handle in background {
        if tokio::time::timeout(DRAIN_TIMEOUT, handle).await.is_err() {
            tracing::warn!("Background task did not stop in time");
        }
    }

    tracing::info!("Shutdown complete");
    served
}

async fn bind_tcp(address: &str) -> Result<TcpListener, LbError> {
    TcpListener::bind(address).await.map_err(|source| LbError::Bind {
        address: address.to_string(),
        source,
    })
}

fn spawn_config_watcher(
    path: &Path,
    pool: Arc<ServerPool>,
    shutdown: &Shutdown,
) -> Option<notify::RecommendedWatcher> {
    let (watcher, mut updates) = ConfigWatcher::new(path);
    let watcher = match watcher.run() {
        Ok(watcher) => watcher,
        Err(e) => {
            tracing::warn!(path = ?path, error = %e, "Config watcher unavailable, backends are fixed");
            return None;
        }
    };

    let mut stop = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                update = updates.recv() => match update {
                    Some(config) => {
                        let added = apply_backends(&pool, &config);
                        tracing::info!(added, total = pool.len(), "Applied reloaded backends");
                    }
                    None => break,
                },
                _ = stop.recv() => break,
            }
        }
    });

    Some(watcher)
}
