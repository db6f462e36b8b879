//! API Routes
//!
//! Configures the Axum router for the object cache endpoints.

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{get_handler, set_handler, AppState};

/// Creates the router.
///
/// # Endpoints
/// - `GET /<key>` - Read a value and its remaining TTL
/// - `POST /<key>?value=<v>&expire=<n>` - Store a value for `n` seconds
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
        .route("/*key", get(get_handler).post(set_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
