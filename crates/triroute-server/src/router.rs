//! Wires the handler module into an `axum::Router`.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::auth::require_bearer_token;
use crate::handler::{
    chat_completions_handler, dashboard_handler, health_handler, usage_handler,
};
use crate::state::AppState;

/// Builds the full HTTP surface: the routing entry point plus the three
/// read-only status endpoints, all behind the same bearer-token gate.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.body_limit;
    Router::new()
        .route("/v1/chat/completions", post(chat_completions_handler))
        .route("/health", get(health_handler))
        .route("/usage", get(usage_handler))
        .route("/dashboard", get(dashboard_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_bearer_token,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
