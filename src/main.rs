//! Self-adaptive load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                LOAD BALANCER                 │
//!                        │                                              │
//!   Client connection    │  ┌──────────┐   ┌──────────┐   ┌─────────┐  │
//!   ─────────────────────┼─▶│ L4 relay │──▶│ Strategy │──▶│  pool   │  │
//!                        │  │ L7 proxy │   │ adaptive │   │ backend │──┼──▶ Backend
//!                        │  └──────────┘   └──────────┘   └─────────┘  │
//!                        │                                     ▲        │
//!                        │  ┌────────────┐ ┌───────────┐      │        │
//!                        │  │ health     │─┴─▶ liveness ─────┘        │
//!                        │  │ checker    │  ┌───────────┐             │
//!                        │  └────────────┘  │ admin API │ status/add  │
//!                        │                  └───────────┘             │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use adaptive_lb::config::{loader::load_config, LbConfig, ProxyMode};
use adaptive_lb::lifecycle::startup;
use adaptive_lb::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "adaptive-lb", version)]
#[command(about = "Self-adaptive L4/L7 load balancer", long_about = None)]
struct Args {
    /// TOML configuration file; watched for new backends.
    #[arg(short, long, env = "LB_CONFIG")]
    config: Option<PathBuf>,

    /// Override the configured proxy mode (`l4`/`L4` or `l7`/`L7`).
    #[arg(short, long, env = "LB_MODE", value_enum, ignore_case = true)]
    mode: Option<ProxyMode>,

    /// Override the listener bind address.
    #[arg(short, long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => LbConfig::default(),
    };
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(listen) = args.listen {
        config.listener.bind_address = listen;
    }

    init_logging(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        bind_address = %config.listener.bind_address,
        "adaptive-lb starting"
    );

    startup::run(config, args.config.as_deref()).await?;
    Ok(())
}
