//! Adaptive strategy supervisor.
//!
//! # Responsibilities
//! - Aggregate live metrics of the alive backends on every pick
//! - Choose a delegate strategy from ordered threshold rules
//! - Publish the routing state and record each decision
//!
//! # Rules (first match wins)
//! ```text
//! errorRate    > error_rate_threshold   → random            (high_error_rate)
//! maxConns     > max_conns_threshold    → leastconnections  (high_concurrency)
//! avgLatencyMs > latency_threshold_ms   → leastconnections  (high_latency)
//! otherwise                             → roundrobin        (normal_conditions)
//! ```
//!
//! `errorRate = totalErrors / (totalConns + 1)`, so the rate is coupled
//! to connection volume rather than request volume.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::config::AdaptiveConfig;
use crate::load_balancer::{
    backend::{Backend, Selection},
    decision::{Decision, DecisionLog},
    least_conn::LeastConnections,
    pool::ServerPool,
    random::Random,
    round_robin::RoundRobin,
    LoadBalancer,
};
use crate::observability::metrics;

/// Why the router chose its current delegate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    HighErrorRate,
    HighConcurrency,
    HighLatency,
    NormalConditions,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Reason::HighErrorRate => "high_error_rate",
            Reason::HighConcurrency => "high_concurrency",
            Reason::HighLatency => "high_latency",
            Reason::NormalConditions => "normal_conditions",
        }
    }

    pub fn mode(self) -> Mode {
        match self {
            Reason::HighErrorRate => Mode::Random,
            Reason::HighConcurrency | Reason::HighLatency => Mode::LeastConnections,
            Reason::NormalConditions => Mode::RoundRobin,
        }
    }
}

/// Delegate strategy selected for a pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    RoundRobin,
    LeastConnections,
    Random,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::RoundRobin => "roundrobin",
            Mode::LeastConnections => "leastconnections",
            Mode::Random => "random",
        }
    }
}

/// Sums over the alive backends of a snapshot. Dead backends are skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregateMetrics {
    pub alive: usize,
    pub total_conns: i64,
    pub total_latency: Duration,
    pub total_errors: u64,
    pub max_conns: i64,
}

impl AggregateMetrics {
    pub fn collect(backends: &[Arc<Backend>]) -> Self {
        let mut agg = Self::default();
        for backend in backends {
            let m = backend.metrics();
            if !m.alive {
                continue;
            }
            agg.alive += 1;
            agg.total_conns += m.active_conns;
            agg.total_latency += m.latency;
            agg.total_errors += m.error_count;
            agg.max_conns = agg.max_conns.max(m.active_conns);
        }
        agg
    }

    pub fn avg_conns(&self) -> i64 {
        if self.alive == 0 {
            return 0;
        }
        self.total_conns / self.alive as i64
    }

    pub fn avg_latency_ms(&self) -> u128 {
        if self.alive == 0 {
            return 0;
        }
        self.total_latency.as_nanos() / self.alive as u128 / 1_000_000
    }

    pub fn error_rate(&self) -> f64 {
        self.total_errors as f64 / (self.total_conns + 1) as f64
    }

    pub fn classify(&self, config: &AdaptiveConfig) -> Reason {
        if self.error_rate() > config.error_rate_threshold {
            Reason::HighErrorRate
        } else if self.max_conns > config.max_conns_threshold {
            Reason::HighConcurrency
        } else if self.avg_latency_ms() > u128::from(config.latency_threshold_ms) {
            Reason::HighLatency
        } else {
            Reason::NormalConditions
        }
    }
}

/// Current algorithm, reason and last pick, published as one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingState {
    pub algorithm: &'static str,
    pub reason: &'static str,
    pub last_picked: Option<String>,
}

impl Default for RoutingState {
    fn default() -> Self {
        Self {
            algorithm: Mode::RoundRobin.as_str(),
            reason: Reason::NormalConditions.as_str(),
            last_picked: None,
        }
    }
}

/// Supervisor that picks a strategy from live metrics, then delegates.
#[derive(Debug)]
pub struct AdaptiveRouter {
    pool: Arc<ServerPool>,
    config: AdaptiveConfig,
    round_robin: RoundRobin,
    least_conn: LeastConnections,
    random: Random,
    state: ArcSwap<RoutingState>,
    decisions: DecisionLog,
}

impl AdaptiveRouter {
    pub fn new(pool: Arc<ServerPool>) -> Self {
        Self::with_config(pool, AdaptiveConfig::default())
    }

    pub fn with_config(pool: Arc<ServerPool>, config: AdaptiveConfig) -> Self {
        let decisions = DecisionLog::with_capacity(config.decision_log_capacity);
        Self {
            pool,
            config,
            round_robin: RoundRobin::new(),
            least_conn: LeastConnections::new(),
            random: Random::new(),
            state: ArcSwap::from_pointee(RoutingState::default()),
            decisions,
        }
    }

    /// Evaluate over a fresh pool snapshot and return the chosen backend.
    pub fn pick(&self) -> Option<Selection> {
        let backends = self.pool.get_servers();
        self.select(&backends)
    }

    fn select(&self, backends: &[Arc<Backend>]) -> Option<Selection> {
        if backends.is_empty() {
            tracing::debug!("Adaptive router: no backends in pool");
            return None;
        }

        let agg = AggregateMetrics::collect(backends);
        if agg.alive == 0 {
            tracing::debug!(backends = backends.len(), "Adaptive router: no alive backends");
            return None;
        }

        let reason = agg.classify(&self.config);
        let mode = reason.mode();

        tracing::debug!(
            algo = mode.as_str(),
            reason = reason.as_str(),
            alive = agg.alive,
            avg_conns = agg.avg_conns(),
            max_conns = agg.max_conns,
            avg_latency_ms = agg.avg_latency_ms() as u64,
            error_rate = agg.error_rate(),
            "Adaptive evaluation"
        );

        let selected = match mode {
            Mode::Random => self.random.next_server(backends),
            Mode::LeastConnections => self.least_conn.next_server(backends),
            Mode::RoundRobin => self.round_robin.next_server(backends),
        };

        let decision = selected.as_ref().map(|selection| Decision {
            time: SystemTime::now(),
            algorithm: mode.as_str(),
            reason: reason.as_str(),
            backend: selection.address().to_string(),
        });

        // State and log move together so `last_picked` matches the newest entry.
        self.decisions.record_with(decision, || {
            let last_picked = match &selected {
                Some(s) => Some(s.address().to_string()),
                None => self.state.load().last_picked.clone(),
            };
            self.state.store(Arc::new(RoutingState {
                algorithm: mode.as_str(),
                reason: reason.as_str(),
                last_picked,
            }));
        });

        if selected.is_some() {
            metrics::record_decision(mode.as_str(), reason.as_str());
        }

        selected
    }

    /// Consistent view of algorithm, reason and last pick.
    pub fn routing_state(&self) -> Arc<RoutingState> {
        self.state.load_full()
    }

    pub fn current_algo(&self) -> &'static str {
        self.state.load().algorithm
    }

    pub fn reason(&self) -> &'static str {
        self.state.load().reason
    }

    pub fn last_picked(&self) -> Option<String> {
        self.state.load().last_picked.clone()
    }

    pub fn decisions(&self) -> &DecisionLog {
        &self.decisions
    }

    /// Routing state and a copy of the decision log, read as one view.
    pub fn report(&self) -> (RoutingState, Vec<Decision>) {
        let (decisions, state) = self.decisions.snapshot_with(|| (*self.state.load_full()).clone());
        (state, decisions)
    }
}

impl LoadBalancer for AdaptiveRouter {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Selection> {
        self.select(backends)
    }

    fn name(&self) -> &'static str {
        "adaptive"
    }
}
