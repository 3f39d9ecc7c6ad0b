//! Least Connections load balancing strategy.

use std::sync::{Arc, Mutex, PoisonError};

use crate::load_balancer::{
    backend::{Backend, Selection},
    LoadBalancer,
};

/// Least connections selector.
///
/// Selects the alive backend with the fewest active connections and
/// reserves a slot on it as part of the same call. Ties go to the first
/// backend in iteration order.
#[derive(Debug, Default)]
pub struct LeastConnections {
    gate: Mutex<()>,
}

impl LeastConnections {
    pub fn new() -> Self {
        Self::default()
    }

    fn least_loaded(backends: &[Arc<Backend>]) -> Option<&Arc<Backend>> {
        let mut selected = None;
        let mut min_conns = i64::MAX;
        for backend in backends {
            let m = backend.metrics();
            if m.alive && m.active_conns < min_conns {
                min_conns = m.active_conns;
                selected = Some(backend);
            }
        }
        selected
    }
}

impl LoadBalancer for LeastConnections {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Selection> {
        if backends.is_empty() {
            return None;
        }

        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);

        // The candidate may die between the scan and the reservation;
        // rescan in that case, at most once per backend.
        for _ in 0..backends.len() {
            let candidate = Self::least_loaded(backends)?;
            if candidate.try_reserve() {
                return Some(Selection::reserved(candidate.clone()));
            }
        }
        None
    }

    fn name(&self) -> &'static str {
        "leastconnections"
    }
}
