//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod access;
pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Read-only views
        .route("/state", get(state_handler))
        .route("/timers/:id", get(timer_handler))
        .route("/log", get(log_handler))
        .route("/events", get(events_handler))
        .route("/health", get(health_handler))
        // Admin operations
        .route("/timers/:id/start", post(start_handler))
        .route("/timers/:id/stop", post(stop_handler))
        .route("/timers/:id/restart", post(restart_handler))
        .route("/timers/:id/adjust", post(adjust_handler))
        .route("/timers/:id/jump", post(jump_handler))
        .route("/day/reset", post(reset_day_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
