pub mod routes;
pub mod ws;

use crate::state::AppState;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/simulation/start", post(routes::start_simulation))
        .route("/api/simulation/step", post(routes::step_simulation))
        .route("/api/simulation/state", get(routes::get_state))
        .route("/api/simulation/history", get(routes::get_history))
        .route("/api/simulation/health", get(routes::get_health))
        .route("/api/simulation/report", get(routes::get_report))
        .route("/api/market/quote/{symbol}", get(routes::get_quote))
        .route("/api/market/quotes", get(routes::get_quotes))
        .route("/api/market/summary", get(routes::get_market_summary))
        .route("/api/market/search", get(routes::search_symbols))
        .route("/api/counters", get(routes::get_counters))
        .route("/ws", get(ws::ws_handler))
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        .with_state(state)
}
