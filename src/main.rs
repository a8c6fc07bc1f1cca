//! Recommendation gateway (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!   Client                ┌──────────────────────────────────────────────┐
//!   ─────────────────────▶│ http server (request id, trace, limits)      │
//!                         └───────────────────────┬──────────────────────┘
//!                                                 ▼
//!                         ┌──────────────────────────────────────────────┐
//!                         │ validate body, derive client key             │
//!                         └───────────────────────┬──────────────────────┘
//!                                                 ▼
//!                         ┌──────────────────────────────────────────────┐
//!                         │ mediation                                    │
//!                         │   rate limit → bulkhead → circuit breaker    │
//!                         │   → deadline → backend invoker               │
//!                         └───────────────────────┬──────────────────────┘
//!                                                 ▼
//!   Client                ┌──────────────────────────────────────────────┐
//!   ◀─────────────────────│ payload or problem+json, rate-limit headers  │
//!                         └──────────────────────────────────────────────┘
//!
//!   Cross-cutting: config · observability (tracing, metrics) · lifecycle
//! ```

use std::path::PathBuf;

use clap::Parser;

use recommendation_gateway::config::load_config;
use recommendation_gateway::lifecycle::{signals, startup, Shutdown};
use recommendation_gateway::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "recommendation-gateway")]
#[command(about = "Resilient gateway in front of the recommendation backend", long_about = None)]
struct Args {
    /// TOML configuration file; defaults and GATEWAY_* variables apply without it.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref())?;
    init_logging(&config.observability.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        backend = %config.backend.base_url,
        request_timeout_secs = config.timeouts.request_secs,
        "recommendation-gateway starting"
    );

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    startup::run(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
