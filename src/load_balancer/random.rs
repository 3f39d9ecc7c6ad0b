//! Random load balancing strategy.

use std::sync::Arc;

use rand::Rng;

use crate::load_balancer::{
    backend::{Backend, Selection},
    LoadBalancer,
};

/// Random selector.
///
/// Draws up to `n` indices uniformly with replacement and returns the
/// first alive backend hit. This is probabilistic: it can miss alive
/// backends and return none.
#[derive(Debug, Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for Random {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Selection> {
        let len = backends.len();
        if len == 0 {
            return None;
        }

        let mut rng = rand::thread_rng();
        for _ in 0..len {
            let backend = &backends[rng.gen_range(0..len)];
            if backend.is_alive() {
                return Some(Selection::new(backend.clone()));
            }
        }
        None
    }

    fn name(&self) -> &'static str {
        "random"
    }
}
