//! L7 reverse proxy behaviour against real sockets.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use adaptive_lb::config::Algorithm;
use adaptive_lb::load_balancer::backend::Backend;
use adaptive_lb::ServerPool;
use reqwest::StatusCode;

mod common;

#[tokio::test]
async fn test_forwards_request_and_sets_request_id() {
    let backend_addr = common::start_http_backend("from-backend").await;
    let pool = Arc::new(ServerPool::from_backends([Backend::new(backend_addr.to_string(), 1)]));
    let strategy = common::strategy(Algorithm::Adaptive, &pool);
    let (proxy_addr, shutdown) = common::start_l7_proxy(pool.clone(), strategy).await;

    let res = common::http_client()
        .get(format!("http://{}/some/path?q=1", proxy_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.text().await.unwrap(), "from-backend");

    let backend = pool.get_servers()[0].clone();
    assert!(common::wait_until(Duration::from_secs(2), || backend.active_connections() == 0).await);
    assert!(backend.latency() > Duration::ZERO);

    shutdown.trigger();
}

#[tokio::test]
async fn test_keeps_client_request_id() {
    let backend_addr = common::start_http_backend("ok").await;
    let pool = Arc::new(ServerPool::from_backends([Backend::new(backend_addr.to_string(), 1)]));
    let strategy = common::strategy(Algorithm::RoundRobin, &pool);
    let (proxy_addr, shutdown) = common::start_l7_proxy(pool, strategy).await;

    let res = common::http_client()
        .get(format!("http://{}/", proxy_addr))
        .header("x-request-id", "req-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "req-123");

    shutdown.trigger();
}

#[tokio::test]
async fn test_round_robin_alternates_backends() {
    let a = common::start_http_backend("a").await;
    let b = common::start_http_backend("b").await;
    let pool = Arc::new(ServerPool::from_backends([
        Backend::new(a.to_string(), 1),
        Backend::new(b.to_string(), 1),
    ]));
    let strategy = common::strategy(Algorithm::RoundRobin, &pool);
    let (proxy_addr, shutdown) = common::start_l7_proxy(pool, strategy).await;

    let client = common::http_client();
    let mut bodies = Vec::new();
    for _ in 0..4 {
        let res = client.get(format!("http://{}/", proxy_addr)).send().await.unwrap();
        bodies.push(res.text().await.unwrap());
    }
    assert_eq!(bodies, vec!["a", "b", "a", "b"]);

    shutdown.trigger();
}

#[tokio::test]
async fn test_no_backend_is_service_unavailable() {
    let pool = Arc::new(ServerPool::new());
    let strategy = common::strategy(Algorithm::Adaptive, &pool);
    let (proxy_addr, shutdown) = common::start_l7_proxy(pool, strategy).await;

    let res = common::http_client()
        .get(format!("http://{}/", proxy_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    shutdown.trigger();
}

#[tokio::test]
async fn test_unreachable_backend_is_bad_gateway() {
    let dead = common::closed_addr();
    let pool = Arc::new(ServerPool::from_backends([Backend::new(dead.to_string(), 1)]));
    let strategy = common::strategy(Algorithm::LeastConnections, &pool);
    let (proxy_addr, shutdown) = common::start_l7_proxy(pool.clone(), strategy).await;

    let res = common::http_client()
        .get(format!("http://{}/", proxy_addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    let backend = pool.get_servers()[0].clone();
    assert_eq!(backend.active_connections(), 0);
    assert_eq!(backend.error_count(), 1);
    assert!(backend.is_alive());

    shutdown.trigger();
}

#[tokio::test]
async fn test_random_only_uses_alive_backends() {
    let a = common::start_http_backend("a").await;
    let b = common::start_http_backend("b").await;
    let pool = Arc::new(ServerPool::from_backends([
        Backend::new(a.to_string(), 1),
        Backend::new(b.to_string(), 1),
    ]));
    pool.get_servers()[1].mark_down();
    let strategy = common::strategy(Algorithm::Random, &pool);
    let (proxy_addr, shutdown) = common::start_l7_proxy(pool, strategy).await;

    let client = common::http_client();
    let mut seen = HashSet::new();
    for _ in 0..10 {
        let res = client.get(format!("http://{}/", proxy_addr)).send().await.unwrap();
        // Random may miss the single alive backend within its draws.
        if res.status() == StatusCode::OK {
            seen.insert(res.text().await.unwrap());
        } else {
            assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        }
    }
    assert!(!seen.contains("b"));

    shutdown.trigger();
}

#[tokio::test]
async fn test_client_dropping_body_midway_releases_slot() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let backend_addr = common::start_streaming_http_backend().await;
    let pool = Arc::new(ServerPool::from_backends([Backend::new(backend_addr.to_string(), 1)]));
    let strategy = common::strategy(Algorithm::RoundRobin, &pool);
    let (proxy_addr, shutdown) = common::start_l7_proxy(pool.clone(), strategy).await;

    let mut client = tokio::net::TcpStream::connect(proxy_addr).await.unwrap();
    client
        .write_all(b"GET /stream HTTP/1.1\r\nHost: lb\r\n\r\n")
        .await
        .unwrap();

    let mut seen = Vec::new();
    let mut buf = [0u8; 256];
    while !seen.windows(5).any(|w| w == b"chunk") {
        let n = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert!(n > 0, "proxy closed before streaming");
        seen.extend_from_slice(&buf[..n]);
    }

    let backend = pool.get_servers()[0].clone();
    assert_eq!(backend.active_connections(), 1);

    drop(client);
    assert!(common::wait_until(Duration::from_secs(3), || backend.active_connections() == 0).await);
    assert_eq!(backend.error_count(), 0);

    shutdown.trigger();
}
