//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → LbConfig (validated, immutable)
//!     → handed to startup wiring
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new backends appended to the pool
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Reload only ever adds backends; the pool has no removal

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    AdaptiveConfig, AdminConfig, Algorithm, BackendConfig, HealthCheckConfig, LbConfig, ListenerConfig,
    ObservabilityConfig, ProxyMode, RoutingConfig, TimeoutConfig,
};
