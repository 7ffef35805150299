// =============================================================================
// Equity Pulse — Main Entry Point
// =============================================================================
//
// Boots with auto-update off unless `auto_update_on_start` (or
// PULSE_AUTO_UPDATE) says otherwise.  Cycles can always be started through
// the API.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod analysis;
mod api;
mod app_state;
mod errors;
mod indicators;
mod market_data;
mod runtime_config;
mod scheduler;
mod store;
mod symbols;
mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::market_data::YahooProvider;
use crate::runtime_config::RuntimeConfig;
use crate::store::{AnalysisStore, MemoryStore};

const CONFIG_PATH: &str = "equity_pulse_config.json";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Equity Pulse starting up");

    let mut config = RuntimeConfig::load(CONFIG_PATH).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        RuntimeConfig::default()
    });

    if let Ok(list) = std::env::var("PULSE_SYMBOLS") {
        config.override_symbols(&list);
    }
    if let Ok(flag) = std::env::var("PULSE_AUTO_UPDATE") {
        config.auto_update_on_start = matches!(flag.trim(), "1" | "true" | "yes");
    }

    config.validate().context("invalid runtime config")?;

    info!(
        symbols = config.symbols.len(),
        max_calls = config.rate_limit.max_calls_per_window,
        window_secs = config.rate_limit.window_secs,
        policy = ?config.rate_limit.policy,
        "Configured universe and rate budget"
    );

    // ── 2. Provider & store ──────────────────────────────────────────────
    let provider = Arc::new(YahooProvider::new(&config.provider)?);

    let store: Arc<dyn AnalysisStore> = match std::env::var("PULSE_STORE_PATH") {
        Ok(path) => Arc::new(MemoryStore::open(&path)?),
        Err(_) => {
            info!("PULSE_STORE_PATH not set, analysis results stay in memory");
            Arc::new(MemoryStore::new())
        }
    };

    // ── 3. Build shared state ────────────────────────────────────────────
    let auto_start = config.auto_update_on_start;
    let state = Arc::new(AppState::new(config, provider, store));

    // ── 4. Start the API server ──────────────────────────────────────────
    let bind_addr =
        std::env::var("PULSE_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".into());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {bind_addr}"))?;
    info!(addr = %bind_addr, "API server listening");

    let app = api::rest::router(state.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    // ── 5. Auto-update ───────────────────────────────────────────────────
    if auto_start {
        match state.scheduler.start() {
            Ok(cycle_id) => info!(%cycle_id, "Auto-update started on boot"),
            Err(e) => error!(error = %e, "Auto-update could not start"),
        }
    }

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received, stopping gracefully");

    let status = state.scheduler.shutdown(SHUTDOWN_GRACE).await;
    info!(%status, "Scheduler stopped");

    if let Err(e) = state.current_config().save(CONFIG_PATH) {
        error!(error = %e, "Failed to save runtime config on shutdown");
    }

    info!("Equity Pulse shut down complete.");
    Ok(())
}
