//! Admin API: backend registration and status reporting.
//!
//! # Routes
//! ```text
//! POST /admin/add   → append a backend (201)
//! GET  /metrics     → per-backend snapshots
//! GET  /status      → routing state, backends, decision log
//! ```
//!
//! When an API key is configured every route requires a bearer token.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;

use crate::error::LbError;
use crate::load_balancer::{pool::ServerPool, Strategy};

use self::auth::admin_auth_middleware;
use self::handlers::{add_backend, get_metrics, get_status};

/// Shared state of the admin handlers.
#[derive(Debug, Clone)]
pub struct AdminState {
    pub pool: Arc<ServerPool>,
    pub strategy: Arc<Strategy>,
    pub api_key: Option<Arc<str>>,
}

impl AdminState {
    pub fn new(pool: Arc<ServerPool>, strategy: Arc<Strategy>, api_key: Option<String>) -> Self {
        Self {
            pool,
            strategy,
            api_key: api_key.filter(|k| !k.is_empty()).map(Arc::from),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/add", post(add_backend))
        .route("/metrics", get(get_metrics))
        .route("/status", get(get_status))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin API on `listener` until `shutdown` resolves.
pub async fn serve(
    state: AdminState,
    listener: TcpListener,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), LbError> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, auth = state.api_key.is_some(), "Admin API serving");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
