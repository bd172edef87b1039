mod auth;
mod generate;
mod health;
mod metrics;
mod usage;

use axum::{
    Router,
    http::HeaderMap,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

pub use auth::{login_handler, logout_handler};
pub use generate::generate_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use usage::usage_handler;

pub const SESSION_HEADER: &str = "x-session-token";

// Session token from the x-session-token header, if present and non-empty
fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

// Router with every route; serve it with connect info so handlers see the peer address
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/login", post(login_handler))
        .route("/api/logout", post(logout_handler))
        .route("/api/usage", get(usage_handler))
        .route("/api/generate-phrases", post(generate_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
