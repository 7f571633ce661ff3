use crate::errors::EngineError;
use crate::market::{self, QuoteLookup};
use crate::metrics::PerformanceReport;
use crate::state::{AppState, StateSnapshot};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use std::sync::Arc;

#[derive(serde::Deserialize)]
pub struct QuotesQuery {
    pub symbols: String,
}

#[derive(serde::Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": detail.into() }))).into_response()
}

/// Status code for an error coming back from the session task.
fn session_error(e: EngineError) -> Response {
    let status = match e {
        EngineError::InvalidActionShape { .. } => StatusCode::BAD_REQUEST,
        EngineError::ChannelClosed(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, e.to_string())
}

// ── Simulation ──

/// POST /api/simulation/start -- reset and begin a new run
pub async fn start_simulation(State(state): State<Arc<AppState>>) -> Response {
    match state.session.reset().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => session_error(e),
    }
}

/// POST /api/simulation/step -- advance one step with the attached policy
pub async fn step_simulation(State(state): State<Arc<AppState>>) -> Response {
    match state.session.step().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => session_error(e),
    }
}

/// GET /api/simulation/state -- latest snapshot (from watch channel, no round trip)
pub async fn get_state(State(state): State<Arc<AppState>>) -> Json<StateSnapshot> {
    let snapshot = state.snapshot_rx.borrow().clone();
    Json(snapshot)
}

/// GET /api/simulation/history -- every step of the current run
pub async fn get_history(State(state): State<Arc<AppState>>) -> Response {
    match state.session.history().await {
        Ok(history) => Json(history).into_response(),
        Err(e) => session_error(e),
    }
}

pub async fn get_health(State(state): State<Arc<AppState>>) -> Response {
    match state.session.health().await {
        Ok(health) => Json(health).into_response(),
        Err(e) => session_error(e),
    }
}

/// GET /api/simulation/report -- performance metrics of the current run
pub async fn get_report(State(state): State<Arc<AppState>>) -> Response {
    let curve = match state.session.equity_curve().await {
        Ok(c) => c,
        Err(e) => return session_error(e),
    };
    match PerformanceReport::from_curve(&curve, state.config.risk_free_rate) {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(StatusCode::CONFLICT, e.to_string()),
    }
}

// ── Market ──

/// GET /api/market/quote/{symbol}
pub async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Response {
    let Some(symbol) = market::normalize_symbol(&symbol) else {
        return error_response(StatusCode::BAD_REQUEST, "symbol required");
    };
    match state.quotes.quote(&symbol).await {
        Ok(QuoteLookup::Found(q)) => Json(q).into_response(),
        Ok(QuoteLookup::NotFound) => {
            error_response(StatusCode::NOT_FOUND, format!("quote not found for {symbol}"))
        }
        Err(e) => {
            tracing::warn!(symbol = %symbol, error = %e, "quote lookup failed");
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

/// GET /api/market/quotes?symbols=AAPL,MSFT
pub async fn get_quotes(
    State(state): State<Arc<AppState>>,
    Query(params): Query<QuotesQuery>,
) -> Response {
    let symbols = market::parse_symbol_list(&params.symbols);
    if symbols.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "at least one symbol required");
    }
    Json(state.quotes.quotes(&symbols).await).into_response()
}

pub async fn get_market_summary(State(state): State<Arc<AppState>>) -> Response {
    Json(state.quotes.summary().await).into_response()
}

/// GET /api/market/search?q=
pub async fn search_symbols(Query(params): Query<SearchQuery>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "symbols": market::search_symbols(&params.q) }))
}

/// GET /api/counters -- performance counters (lock-free reads)
pub async fn get_counters(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    use portable_atomic::Ordering::Relaxed;
    Json(serde_json::json!({
        "steps_processed": state.counters.steps_processed.load(Relaxed),
        "resets": state.counters.resets.load(Relaxed),
        "noop_steps": state.counters.noop_steps.load(Relaxed),
        "step_errors": state.counters.step_errors.load(Relaxed),
        "quote_fetches": state.counters.quote_fetches.load(Relaxed),
        "ws_messages_sent": state.counters.ws_messages_sent.load(Relaxed),
    }))
}
