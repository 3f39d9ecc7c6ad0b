//! Shared utilities for integration testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use adaptive_lb::config::{AdaptiveConfig, Algorithm};
use adaptive_lb::lifecycle::shutdown::{self, Shutdown};
use adaptive_lb::load_balancer::{pool::ServerPool, Strategy};
use adaptive_lb::net::Listener;
use adaptive_lb::{HttpProxy, TcpProxy};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

/// Start a TCP backend that echoes every byte back.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut rd, mut wr) = socket.split();
                let _ = tokio::io::copy(&mut rd, &mut wr).await;
            });
        }
    });
    addr
}

/// Start an HTTP backend that answers every request with `body`.
pub async fn start_http_backend(body: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                // Headers only; test requests carry no body.
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                loop {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => {
                            buf.extend_from_slice(&chunk[..n]);
                            if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                                break;
                            }
                        }
                    }
                }

                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Start a TCP backend that sends `payload` and then closes, ignoring input.
pub async fn start_closing_backend(payload: &'static [u8]) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = socket.write_all(payload).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

/// Start a TCP backend that reads once and then resets the connection.
#[allow(deprecated)]
pub async fn start_resetting_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 64];
                let _ = socket.read(&mut buf).await;
                // Zero linger turns the close into an RST.
                let _ = socket.set_linger(Some(Duration::ZERO));
                drop(socket);
            });
        }
    });
    addr
}

/// Start an HTTP backend that streams a chunked body until the peer goes away.
pub async fn start_streaming_http_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                if !matches!(socket.read(&mut buf).await, Ok(n) if n > 0) {
                    return;
                }
                let head = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n";
                if socket.write_all(head).await.is_err() {
                    return;
                }
                loop {
                    if socket.write_all(b"5\r\nchunk\r\n").await.is_err() {
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            });
        }
    });
    addr
}

/// An address nothing is listening on.
pub fn closed_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

pub fn strategy(algorithm: Algorithm, pool: &Arc<ServerPool>) -> Arc<Strategy> {
    Arc::new(Strategy::from_algorithm(algorithm, pool.clone(), AdaptiveConfig::default()))
}

/// Serve an L4 proxy on an ephemeral port.
pub async fn start_l4_proxy(pool: Arc<ServerPool>, strategy: Arc<Strategy>) -> (SocketAddr, Shutdown) {
    let inner = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = inner.local_addr().unwrap();
    let listener = Listener::from_listener(inner, 1024);

    let shutdown = Shutdown::new();
    let stop = shutdown::recv(shutdown.subscribe());
    let proxy = TcpProxy::new(pool, strategy, CONNECT_TIMEOUT);
    tokio::spawn(async move {
        proxy.serve(listener, stop).await.unwrap();
    });
    (addr, shutdown)
}

/// Serve an L7 proxy on an ephemeral port.
pub async fn start_l7_proxy(pool: Arc<ServerPool>, strategy: Arc<Strategy>) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let stop = shutdown::recv(shutdown.subscribe());
    let proxy = HttpProxy::new(pool, strategy, CONNECT_TIMEOUT, Duration::from_secs(5));
    tokio::spawn(async move {
        proxy.serve(listener, stop).await.unwrap();
    });
    (addr, shutdown)
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
