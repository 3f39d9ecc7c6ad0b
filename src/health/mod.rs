//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Periodic timer (active.rs)
//!     → snapshot of the pool
//!     → one concurrent TCP probe per backend
//!     → success: alive = true, latency = connect time
//!     → failure: alive = false
//! ```
//!
//! # Design Decisions
//! - Probes are fire-and-forget; overlapping probes across ticks are fine
//! - No retries inside a probe: the next tick is the retry
//! - Missed ticks are skipped, not caught up
//! - Proxies never flip liveness; this is the only writer of `alive`

pub mod active;

pub use active::HealthChecker;
