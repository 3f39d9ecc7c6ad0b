//! Round-robin load balancing strategy.

use std::sync::{Arc, Mutex, PoisonError};

use crate::load_balancer::{
    backend::{Backend, Selection},
    LoadBalancer,
};

/// Round-robin selector.
///
/// The cursor lock is held for the whole scan so concurrent callers never
/// start from the same index.
#[derive(Debug, Default)]
pub struct RoundRobin {
    current: Mutex<usize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Selection> {
        let len = backends.len();
        if len == 0 {
            return None;
        }

        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        for i in 0..len {
            let index = (*current + i) % len;
            let backend = &backends[index];
            if backend.is_alive() {
                *current = (index + 1) % len;
                return Some(Selection::new(backend.clone()));
            }
        }
        None
    }

    fn name(&self) -> &'static str {
        "roundrobin"
    }
}
