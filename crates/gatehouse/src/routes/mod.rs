//! HTTP route handlers for Gatehouse.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

mod auth;
mod health;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & Status
        .route("/health", get(health::health_check))

        // Challenge-response endpoints
        .route("/challenge", get(auth::get_challenge))
        .route("/login", post(auth::login))
        .route("/signup", post(auth::signup))

        // Request tracing
        .layer(TraceLayer::new_for_http())

        // Add shared state
        .with_state(state)
}
