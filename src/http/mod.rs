//! HTTP protocol handling subsystem (L7 data plane).
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → request id layer (x-request-id, UUID v4)
//!     → server.rs (route via strategy, reserve backend slot)
//!     → request.rs (rewrite to backend authority, strip hop headers)
//!     → hyper client (bounded connect, request timeout)
//!     → response streamed back; slot released when the body completes
//! ```

pub mod request;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::HttpProxy;
