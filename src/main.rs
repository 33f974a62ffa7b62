//! ==============================================================================
//! main.rs - pond relay entry point
//! ==============================================================================
//!
//! purpose:
//!     receives water-quality readings from the pond's esp32 node, keeps the
//!     latest one, and raises telegram alerts when a parameter leaves its
//!     safe range.
//!
//! responsibilities:
//!     - load relay.toml (+ env overrides for bot credentials)
//!     - build the alert forwarder
//!     - serve the http api and dashboard
//!
//! relationships:
//!     - uses: config.rs, alerts.rs, server.rs, state.rs (via the pond_relay lib)
//!
//!     ┌──────────┐  POST /update   ┌───────────────────────────┐  sendMessage  ┌──────────┐
//!     │  esp32   │ ──────────────▶ │ pond-relay                │ ────────────▶ │ telegram │
//!     │  sensors │                 │  latest reading (RwLock)  │               │   bot    │
//!     └──────────┘                 │  range check / projection │               └──────────┘
//!                                  └─────────────┬─────────────┘
//!                                                │ GET / , /latest , /predict/:interval
//!                                                ▼
//!                                           dashboard
//!
//! ==============================================================================

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use pond_relay::alerts::AlertForwarder;
use pond_relay::config::RelayConfig;
use pond_relay::server;
use pond_relay::state::AppState;
use pond_relay::telemetry;

#[derive(Debug, Parser)]
#[command(version, about = "Water-quality telemetry relay")]
struct Args {
    /// Path to relay.toml (defaults to config/relay.toml or ../config/relay.toml)
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // step 1: configuration (logging needs its level, so it comes first)
    let (mut config, source) = RelayConfig::load_or_default(args.config.as_deref())
        .context("failed to load configuration")?;
    telemetry::init(&config.logging.level);
    match &source {
        Some(path) => tracing::info!("[CONFIG] Loaded from {}", path.display()),
        None => tracing::warn!("[CONFIG] No config file found - using defaults"),
    }
    config.apply_env();
    config.log_summary();

    // step 2: alerts
    let alerts = AlertForwarder::from_config(&config.alerts)
        .context("failed to build alert transport")?;

    // step 3: shared state + router
    let state = AppState::new(alerts);
    let app = server::router(
        state,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    // step 4: serve
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("[STARTUP] Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("[SHUTDOWN] Bye");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("[SHUTDOWN] failed to listen for ctrl-c: {}", e);
    }
}
