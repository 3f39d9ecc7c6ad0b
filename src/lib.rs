//! Self-adaptive L4/L7 load balancer library.

pub mod admin;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::LbConfig;
pub use error::LbError;
pub use http::HttpProxy;
pub use lifecycle::Shutdown;
pub use load_balancer::{pool::ServerPool, LoadBalancer, Strategy};
pub use net::TcpProxy;
