//! L4 proxy: raw TCP relay.
//!
//! # Responsibilities
//! - Accept client connections without ever stopping on a per-connection error
//! - Route each connection through the configured strategy
//! - Dial the backend with a bounded timeout
//! - Relay bytes both ways until the backend finishes or either side
//!   errors, then close both
//!
//! # Accounting
//! ```text
//! select → into_guard (active_conns +1 unless the strategy reserved)
//!     dial fails   → guard.fail_dial() (-1, error_count +1)
//!     relay ends   → guard dropped     (-1, latency = (latency + elapsed) / 2)
//! ```

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{self, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::LbError;
use crate::load_balancer::{self, pool::ServerPool, LoadBalancer, Strategy};
use crate::net::connection::ConnectionId;
use crate::net::listener::Listener;
use crate::observability::metrics;
use crate::resilience::timeouts;

const MODE: &str = "l4";

/// Pause after a failed accept so a persistent error (EMFILE) cannot spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

/// TCP relay in front of the backend pool.
#[derive(Debug, Clone)]
pub struct TcpProxy {
    pool: Arc<ServerPool>,
    balancer: Arc<Strategy>,
    connect_timeout: Duration,
}

impl TcpProxy {
    pub fn new(pool: Arc<ServerPool>, balancer: Arc<Strategy>, connect_timeout: Duration) -> Self {
        Self {
            pool,
            balancer,
            connect_timeout,
        }
    }

    /// Bind `listen_addr` and serve forever.
    ///
    /// Returns only if the listener cannot be bound.
    pub async fn start(self, listen_addr: &str, max_connections: usize) -> Result<(), LbError> {
        let listener = Listener::bind(listen_addr, max_connections).await?;
        self.serve(listener, std::future::pending()).await
    }

    /// Serve an already bound listener until `shutdown` resolves.
    ///
    /// In-flight relays keep running after the accept loop stops.
    pub async fn serve(self, listener: Listener, shutdown: impl Future<Output = ()>) -> Result<(), LbError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, strategy = self.balancer.name(), "L4 proxy serving");
        }
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let proxy = self.clone();
                        tokio::spawn(async move {
                            proxy.handle_connection(stream, peer).await;
                            drop(permit);
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed, continuing");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                _ = &mut shutdown => {
                    tracing::info!("L4 proxy stopped accepting");
                    break;
                }
            }
        }
        Ok(())
    }

    async fn handle_connection(&self, mut client: TcpStream, peer: SocketAddr) {
        let started = Instant::now();
        let id = ConnectionId::new();

        let selection = match load_balancer::select(&self.pool, self.balancer.as_ref()) {
            Ok(selection) => selection,
            Err(e) => {
                tracing::debug!(connection_id = %id, peer = %peer, cause = e.cause(), "No route, closing client");
                metrics::record_no_route(MODE, e.cause());
                return;
            }
        };

        let guard = selection.into_guard(started);
        let address = guard.address().to_string();
        metrics::record_active_connections(&address, guard.backend().active_connections());

        let mut server = match timeouts::connect(&address, self.connect_timeout).await {
            Ok(server) => server,
            Err(e) => {
                tracing::warn!(connection_id = %id, backend = %address, error = %e, "Backend dial failed");
                guard.fail_dial();
                metrics::record_dial_failure(&address);
                metrics::record_request(MODE, "dial_failure", &address, started);
                return;
            }
        };

        tracing::debug!(connection_id = %id, peer = %peer, backend = %address, "Relaying");

        let status = match relay(&mut client, &mut server).await {
            Ok((to_backend, to_client)) => {
                tracing::debug!(connection_id = %id, backend = %address, to_backend, to_client, "Relay finished");
                "ok"
            }
            Err(e) => {
                tracing::debug!(connection_id = %id, backend = %address, error = %e, "Relay ended with error");
                "relay_error"
            }
        };

        // Close both ends before settling the accounting.
        drop(client);
        drop(server);
        let backend = guard.backend().clone();
        drop(guard);

        metrics::record_active_connections(&address, backend.active_connections());
        metrics::record_request(MODE, status, &address, started);
    }
}

/// Copy bytes both ways until the backend side finishes.
///
/// Client EOF is forwarded to the backend as a half-close and the relay
/// keeps draining the backend. Backend EOF, or an error in either
/// direction, ends the relay at once so the caller can close both ends.
async fn relay(client: &mut TcpStream, server: &mut TcpStream) -> io::Result<(u64, u64)> {
    let (mut client_read, mut client_write) = client.split();
    let (mut server_read, mut server_write) = server.split();

    let client_to_server = async {
        let n = io::copy(&mut client_read, &mut server_write).await?;
        server_write.shutdown().await?;
        Ok::<_, io::Error>(n)
    };
    let server_to_client = io::copy(&mut server_read, &mut client_write);
    tokio::pin!(client_to_server, server_to_client);

    let mut to_server = None;
    loop {
        tokio::select! {
            sent = &mut client_to_server, if to_server.is_none() => {
                to_server = Some(sent?);
            }
            received = &mut server_to_client => {
                return Ok((to_server.unwrap_or(0), received?));
            }
        }
    }
}
