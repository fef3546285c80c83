use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Blocking conversion
        .route("/convert", post(handlers::convert_handler))
        // Background conversion reported over SSE
        .route("/api/convert", post(handlers::session_convert_handler))
        .route("/api/progress/:session_id", get(handlers::progress_handler))
        .with_state(state)
}
