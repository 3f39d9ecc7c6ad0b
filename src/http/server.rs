//! L7 proxy: HTTP reverse proxy.
//!
//! # Responsibilities
//! - Route every request through the configured strategy
//! - Forward it to that single backend and stream the response back
//! - Apply the same connection accounting as the L4 relay, per request
//! - Answer 503 when no backend is available instead of hanging

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper::body::{Body as HttpBody, Frame, Incoming, SizeHint};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::error::LbError;
use crate::http::request::{rewrite_for_backend, strip_hop_headers, MakeRequestUuid, X_REQUEST_ID};
use crate::load_balancer::{self, backend::BackendConnectionGuard, pool::ServerPool, LoadBalancer, Strategy};
use crate::observability::metrics;

const MODE: &str = "l7";

/// HTTP reverse proxy in front of the backend pool.
#[derive(Debug, Clone)]
pub struct HttpProxy {
    pool: Arc<ServerPool>,
    balancer: Arc<Strategy>,
    client: Client<HttpConnector, Body>,
    request_timeout: Duration,
}

impl HttpProxy {
    pub fn new(
        pool: Arc<ServerPool>,
        balancer: Arc<Strategy>,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            pool,
            balancer,
            client,
            request_timeout,
        }
    }

    /// Axum router that proxies every path and method.
    ///
    /// Can be served directly or nested under another router.
    pub fn router(self) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(self)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Bind `listen_addr` and serve forever.
    pub async fn start(self, listen_addr: &str) -> Result<(), LbError> {
        let listener = TcpListener::bind(listen_addr).await.map_err(|source| LbError::Bind {
            address: listen_addr.to_string(),
            source,
        })?;
        self.serve(listener, std::future::pending()).await
    }

    /// Serve an already bound listener until `shutdown` resolves.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), LbError> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, strategy = self.balancer.name(), "L7 proxy serving");

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

        tracing::info!("L7 proxy stopped");
        Ok(())
    }

    /// Forward one request to a freshly selected backend.
    pub async fn forward(&self, request: Request<Body>) -> Response {
        let started = Instant::now();
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let selection = match load_balancer::select(&self.pool, self.balancer.as_ref()) {
            Ok(selection) => selection,
            Err(e) => {
                tracing::warn!(request_id = %request_id, cause = e.cause(), "No backend available");
                metrics::record_no_route(MODE, e.cause());
                return (StatusCode::SERVICE_UNAVAILABLE, "No backend available").into_response();
            }
        };

        let guard = selection.into_guard(started);
        let address = guard.address().to_string();
        metrics::record_active_connections(&address, guard.backend().active_connections());

        let upstream = match rewrite_for_backend(request, &address, peer) {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::warn!(request_id = %request_id, backend = %address, error = %e, "Backend address is not a valid authority");
                guard.fail_dial();
                metrics::record_request(MODE, "bad_gateway", &address, started);
                return (StatusCode::BAD_GATEWAY, "Invalid backend address").into_response();
            }
        };

        tracing::debug!(
            request_id = %request_id,
            method = %upstream.method(),
            uri = %upstream.uri(),
            "Proxying request"
        );

        match tokio::time::timeout(self.request_timeout, self.client.request(upstream)).await {
            Ok(Ok(response)) => {
                let status = response.status();
                tracing::debug!(request_id = %request_id, backend = %address, status = %status, "Upstream responded");
                metrics::record_request(MODE, status_class(status), &address, started);

                let (mut parts, body) = response.into_parts();
                strip_hop_headers(&mut parts.headers);
                Response::from_parts(parts, Body::new(GuardedBody { inner: body, _guard: guard }))
            }
            Ok(Err(e)) => {
                if e.is_connect() {
                    tracing::warn!(request_id = %request_id, backend = %address, error = %e, "Backend dial failed");
                    metrics::record_dial_failure(&address);
                } else {
                    tracing::warn!(request_id = %request_id, backend = %address, error = %e, "Upstream error");
                }
                guard.fail_dial();
                metrics::record_request(MODE, "bad_gateway", &address, started);
                (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
            }
            Err(_) => {
                tracing::warn!(
                    request_id = %request_id,
                    backend = %address,
                    timeout_secs = self.request_timeout.as_secs(),
                    "Upstream timed out"
                );
                guard.fail_dial();
                metrics::record_request(MODE, "gateway_timeout", &address, started);
                (StatusCode::GATEWAY_TIMEOUT, "Upstream timed out").into_response()
            }
        }
    }
}

async fn proxy_handler(State(proxy): State<HttpProxy>, request: Request<Body>) -> Response {
    proxy.forward(request).await
}

fn status_class(status: StatusCode) -> &'static str {
    match status.as_u16() {
        100..=199 => "1xx",
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        _ => "5xx",
    }
}

/// Upstream body that holds the backend slot until it is fully sent or dropped.
struct GuardedBody {
    inner: Incoming,
    _guard: BackendConnectionGuard,
}

impl HttpBody for GuardedBody {
    type Data = Bytes;
    type Error = hyper::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.get_mut().inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
