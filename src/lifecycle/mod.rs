//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → pool + strategy → background tasks → proxy listener
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     Broadcast → accept loops, health checker, admin API stop
//! ```
//!
//! # Design Decisions
//! - Listeners start last (traffic only when ready)
//! - Stopping does not cut in-flight relays
//! - Background tasks get a bounded drain window

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
