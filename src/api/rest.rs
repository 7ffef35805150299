// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// Thin control surface over the scheduler.  All endpoints live under
// `/api/v1/`:
//
//   GET  /health                    liveness + uptime
//   POST /auto-update/start         409 unless the scheduler is idle
//   POST /auto-update/stop
//   GET  /progress                  cycle progress snapshot
//   GET  /rate-budget               provider call budget snapshot
//   GET  /symbols                   tracked universe
//   PUT  /symbols                   replace the universe
//   GET  /symbols/:ticker           one symbol
//   POST /symbols/:ticker/refresh   404 for untracked tickers
//   GET  /analysis                  latest result of every stored ticker
//   GET  /analysis/:ticker          404 until a result exists
//   GET  /config                    effective runtime config (read-only)
//
// CORS is configured permissively for development.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::app_state::AppState;
use crate::errors::{RefreshError, SchedulerError};
use crate::market_data::FetchOutcome;
use crate::runtime_config::SymbolConfig;
use crate::scheduler::RefreshOutcome;
use crate::types::Symbol;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        // ── Auto-update control ─────────────────────────────────────
        .route("/api/v1/auto-update/start", post(start_auto_update))
        .route("/api/v1/auto-update/stop", post(stop_auto_update))
        .route("/api/v1/progress", get(progress))
        .route("/api/v1/rate-budget", get(rate_budget))
        // ── Symbols & analysis ──────────────────────────────────────
        .route("/api/v1/symbols", get(symbols).put(replace_symbols))
        .route("/api/v1/symbols/:ticker", get(symbol))
        .route("/api/v1/symbols/:ticker/refresh", post(refresh_symbol))
        .route("/api/v1/analysis", get(all_analyses))
        .route("/api/v1/analysis/:ticker", get(analysis))
        .route("/api/v1/config", get(config))
        // ── Middleware & State ───────────────────────────────────────
        .layer(cors)
        .with_state(state)
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    uptime_seconds: u64,
    tracked_symbols: usize,
    stored_analyses: usize,
    server_time: i64,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        service: env!("CARGO_PKG_NAME"),
        uptime_seconds: state.uptime_secs(),
        tracked_symbols: state.symbols.active().len(),
        stored_analyses: state.store.count().await,
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

// =============================================================================
// Auto-update control
// =============================================================================

async fn start_auto_update(State(state): State<Arc<AppState>>) -> Response {
    match state.scheduler.start() {
        Ok(cycle_id) => {
            info!(%cycle_id, "auto-update started via API");
            (
                StatusCode::ACCEPTED,
                Json(json!({ "started": true, "cycle_id": cycle_id })),
            )
                .into_response()
        }
        Err(e @ SchedulerError::AlreadyRunning(_)) => {
            warn!(error = %e, "start rejected");
            error_body(StatusCode::CONFLICT, e.to_string())
        }
        Err(e) => {
            error!(error = %e, "start failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn stop_auto_update(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let status = state.scheduler.stop();
    info!(%status, "auto-update stop requested via API");
    Json(json!({ "stopped": true, "status": status }))
}

async fn progress(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.scheduler.progress().snapshot())
}

async fn rate_budget(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.budget.snapshot().await)
}

// =============================================================================
// Symbols & analysis
// =============================================================================

async fn symbols(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.symbols.all())
}

async fn replace_symbols(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Vec<SymbolConfig>>,
) -> Response {
    let next: Vec<Symbol> = body
        .iter()
        .map(Symbol::from)
        .filter(|s| !s.ticker.is_empty())
        .collect();
    if next.is_empty() {
        return error_body(StatusCode::BAD_REQUEST, "symbol list must not be empty");
    }

    state.symbols.replace(next);
    let active = state.symbols.active().len();
    info!(active, total = state.symbols.len(), "universe replaced via API");
    Json(json!({
        "total": state.symbols.len(),
        "active": active,
    }))
    .into_response()
}

async fn symbol(State(state): State<Arc<AppState>>, Path(ticker): Path<String>) -> Response {
    match state.symbols.get(&ticker.to_uppercase()) {
        Some(s) => Json(s).into_response(),
        None => error_body(StatusCode::NOT_FOUND, format!("{ticker} is not tracked")),
    }
}

async fn refresh_symbol(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> Response {
    match state.scheduler.refresh_symbol(&ticker).await {
        Ok(outcome) => refresh_response(&ticker, outcome),
        Err(RefreshError::NotTracked(t)) => {
            error_body(StatusCode::NOT_FOUND, format!("{t} is not tracked"))
        }
        Err(e @ RefreshError::Budget(_)) => {
            error!(ticker, error = %e, "refresh aborted");
            error_body(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
        Err(e @ RefreshError::Persistence(_)) => {
            error!(ticker, error = %e, "refresh could not be stored");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn refresh_response(ticker: &str, outcome: RefreshOutcome) -> Response {
    let label = outcome.label();
    let body = match outcome {
        RefreshOutcome::Updated(result) => json!({ "outcome": label, "analysis": result }),
        RefreshOutcome::Skipped(reason) => json!({
            "outcome": label,
            "reason": reason.to_string(),
        }),
        RefreshOutcome::FetchFailed(fetch) => {
            let detail = match &fetch {
                FetchOutcome::Transient(e) | FetchOutcome::Permanent(e) => Some(e.to_string()),
                FetchOutcome::RateLimited | FetchOutcome::Success(_) => None,
            };
            warn!(ticker, outcome = label, "refresh fetch failed");
            json!({ "outcome": label, "error": detail })
        }
    };
    (StatusCode::OK, Json(body)).into_response()
}

async fn all_analyses(State(state): State<Arc<AppState>>) -> Response {
    match state.store.load_all_latest().await {
        Ok(results) => Json(results).into_response(),
        Err(e) => {
            error!(error = %e, "analysis listing failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn analysis(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> Response {
    match state.scheduler.get_analysis(&ticker).await {
        Ok(Some(result)) => Json(result).into_response(),
        Ok(None) => error_body(
            StatusCode::NOT_FOUND,
            format!("no analysis stored for {}", ticker.to_uppercase()),
        ),
        Err(e) => {
            error!(ticker, error = %e, "analysis lookup failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// =============================================================================
// Settings
// =============================================================================

async fn config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.current_config())
}
