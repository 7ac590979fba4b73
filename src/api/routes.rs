//! API Routes
//!
//! Configures the Axum router with all cache admin endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    bump_state_handler, clear_handler, debug_handler, get_handler, health_handler,
    remove_handler, set_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /set` - Store a value under a namespaced key
/// - `GET /get/:key` - Retrieve a valid value by key
/// - `DELETE /del/:key` - Remove a key from both tiers
/// - `DELETE /clear` - Remove every entry from both tiers
/// - `GET /debug/:key` - Diagnostics report for a key
/// - `GET /stats` - Get cache statistics
/// - `POST /state/bump` - Advance the external state version
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(remove_handler))
        .route("/clear", delete(clear_handler))
        .route("/debug/:key", get(debug_handler))
        .route("/stats", get(stats_handler))
        .route("/state/bump", post(bump_state_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
