//! Error taxonomy for the load balancer.
//!
//! Per-connection failures (`NoBackendsRegistered`, `NoAliveBackend`,
//! `Dial*`) are handled where they occur and never stop a serving loop.
//! Only `Bind` is fatal to a proxy.

use std::time::Duration;

use thiserror::Error;

use crate::config::loader::ConfigError;

/// Errors surfaced by the routing core and the proxies.
#[derive(Debug, Error)]
pub enum LbError {
    /// The pool has no backends at all.
    #[error("no backends registered")]
    NoBackendsRegistered,

    /// Backends exist but the active strategy found none alive.
    #[error("no alive backend available")]
    NoAliveBackend,

    /// Connecting to the selected backend failed.
    #[error("dial {address} failed: {source}")]
    Dial {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Connecting to the selected backend did not finish in time.
    #[error("dial {address} timed out after {timeout:?}")]
    DialTimeout { address: String, timeout: Duration },

    /// The listener could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// A single accept call failed.
    #[error("failed to accept: {0}")]
    Accept(#[source] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LbError {
    /// Short label used for metrics and log fields.
    pub fn cause(&self) -> &'static str {
        match self {
            LbError::NoBackendsRegistered => "no_backends",
            LbError::NoAliveBackend => "no_alive_backend",
            LbError::Dial { .. } => "dial_failure",
            LbError::DialTimeout { .. } => "dial_timeout",
            LbError::Bind { .. } => "bind_failure",
            LbError::Accept(_) => "accept_failure",
            LbError::Config(_) => "config",
            LbError::Io(_) => "io",
        }
    }
}
