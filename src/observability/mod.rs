//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout log stream
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (backend, mode, reason)
//! - Metrics go through the `metrics` facade; without an installed
//!   recorder every call is a no-op, which keeps tests quiet

pub mod logging;
pub mod metrics;
