//! Resilience subsystem.
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every outbound dial has a deadline
//! - No retries or failover inside one proxy attempt: a failed dial is
//!   counted on the backend and the client sees the failure

pub mod timeouts;
