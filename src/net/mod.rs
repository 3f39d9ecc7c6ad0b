//! Network layer subsystem (L4 data plane).
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → relay.rs (route, dial backend, bidirectional copy)
//!     → connection.rs (ids for log correlation)
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Bytes are relayed verbatim; no protocol awareness
//! - A failed dial never retries against another backend

pub mod connection;
pub mod listener;
pub mod relay;

pub use listener::Listener;
pub use relay::TcpProxy;
