//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection / inbound request
//!     → pool.rs (copy-on-read snapshot of backends)
//!     → Strategy:
//!         - round_robin.rs (rotate through alive backends)
//!         - least_conn.rs (fewest active connections, reserves a slot)
//!         - random.rs (up to n uniform draws)
//!         - adaptive.rs (pick one of the above from live metrics)
//!     → backend.rs (Selection → BackendConnectionGuard)
//!     → Proxy moves bytes; guard drop settles the accounting
//! ```
//!
//! # Design Decisions
//! - Backends are shared `Arc`s; the pool is the only owner of the list
//! - Each backend's metrics sit behind a single lock
//! - A strategy returning `None` means "no route", never an error to retry

pub mod adaptive;
pub mod backend;
pub mod decision;
pub mod least_conn;
pub mod pool;
pub mod random;
pub mod round_robin;

use std::sync::Arc;

use crate::config::{AdaptiveConfig, Algorithm};
use crate::error::LbError;

use self::adaptive::{AdaptiveRouter, RoutingState};
use self::backend::{Backend, Selection};
use self::decision::Decision;
use self::least_conn::LeastConnections;
use self::pool::ServerPool;
use self::random::Random;
use self::round_robin::RoundRobin;

/// A backend selection algorithm.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    /// Pick one alive backend from `backends`, or `None` if there is none.
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Selection>;

    /// Stable algorithm name used in logs and reports.
    fn name(&self) -> &'static str;
}

/// The closed set of strategies the proxies can be configured with.
#[derive(Debug)]
pub enum Strategy {
    RoundRobin(RoundRobin),
    LeastConnections(LeastConnections),
    Random(Random),
    Adaptive(AdaptiveRouter),
}

impl Strategy {
    pub fn from_algorithm(algorithm: Algorithm, pool: Arc<ServerPool>, adaptive: AdaptiveConfig) -> Self {
        match algorithm {
            Algorithm::RoundRobin => Strategy::RoundRobin(RoundRobin::new()),
            Algorithm::LeastConnections => Strategy::LeastConnections(LeastConnections::new()),
            Algorithm::Random => Strategy::Random(Random::new()),
            Algorithm::Adaptive => Strategy::Adaptive(AdaptiveRouter::with_config(pool, adaptive)),
        }
    }

    pub fn as_adaptive(&self) -> Option<&AdaptiveRouter> {
        match self {
            Strategy::Adaptive(router) => Some(router),
            _ => None,
        }
    }

    /// Routing state and decision log for reporting.
    ///
    /// Fixed strategies report their own name, reason `static` and an
    /// empty log.
    pub fn report(&self) -> (RoutingState, Vec<Decision>) {
        match self {
            Strategy::Adaptive(router) => router.report(),
            other => (
                RoutingState {
                    algorithm: other.name(),
                    reason: "static",
                    last_picked: None,
                },
                Vec::new(),
            ),
        }
    }
}

impl LoadBalancer for Strategy {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Selection> {
        match self {
            Strategy::RoundRobin(s) => s.next_server(backends),
            Strategy::LeastConnections(s) => s.next_server(backends),
            Strategy::Random(s) => s.next_server(backends),
            Strategy::Adaptive(s) => s.next_server(backends),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Strategy::RoundRobin(s) => s.name(),
            Strategy::LeastConnections(s) => s.name(),
            Strategy::Random(s) => s.name(),
            Strategy::Adaptive(s) => s.name(),
        }
    }
}

/// Route over a fresh pool snapshot, classifying a miss.
pub fn select(pool: &ServerPool, balancer: &dyn LoadBalancer) -> Result<Selection, LbError> {
    let backends = pool.get_servers();
    if backends.is_empty() {
        return Err(LbError::NoBackendsRegistered);
    }
    balancer.next_server(&backends).ok_or(LbError::NoAliveBackend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_balancer::backend::BackendMetrics;

    fn pool_of(alive: &[bool]) -> Arc<ServerPool> {
        Arc::new(ServerPool::from_backends(alive.iter().enumerate().map(|(i, &alive)| {
            Backend::with_metrics(
                format!("10.0.0.{}:80", i + 1),
                1,
                BackendMetrics {
                    alive,
                    ..BackendMetrics::default()
                },
            )
        })))
    }

    #[test]
    fn test_select_classifies_no_route() {
        let empty = Arc::new(ServerPool::new());
        let rr = Strategy::from_algorithm(Algorithm::RoundRobin, empty.clone(), AdaptiveConfig::default());
        assert!(matches!(select(&empty, &rr), Err(LbError::NoBackendsRegistered)));

        let dead = pool_of(&[false, false]);
        assert!(matches!(select(&dead, &rr), Err(LbError::NoAliveBackend)));
    }

    #[test]
    fn test_every_strategy_returns_none_without_alive_backends() {
        let pool = pool_of(&[false, false, false]);
        for algorithm in [
            Algorithm::RoundRobin,
            Algorithm::LeastConnections,
            Algorithm::Random,
            Algorithm::Adaptive,
        ] {
            let strategy = Strategy::from_algorithm(algorithm, pool.clone(), AdaptiveConfig::default());
            assert!(strategy.next_server(&pool.get_servers()).is_none(), "{}", strategy.name());
        }
    }

    #[test]
    fn test_every_strategy_finds_the_only_alive_backend() {
        let pool = pool_of(&[false, true]);
        for algorithm in [
            Algorithm::RoundRobin,
            Algorithm::LeastConnections,
            Algorithm::Adaptive,
        ] {
            let strategy = Strategy::from_algorithm(algorithm, pool.clone(), AdaptiveConfig::default());
            let picked = select(&pool, &strategy).unwrap();
            assert_eq!(picked.address(), "10.0.0.2:80", "{}", strategy.name());
        }
    }

    #[test]
    fn test_routing_state_for_fixed_strategy() {
        let pool = pool_of(&[true]);
        let strategy = Strategy::from_algorithm(Algorithm::LeastConnections, pool, AdaptiveConfig::default());
        let (state, decisions) = strategy.report();
        assert_eq!(state.algorithm, "leastconnections");
        assert_eq!(state.reason, "static");
        assert!(decisions.is_empty());
        assert!(strategy.as_adaptive().is_none());
    }
}
