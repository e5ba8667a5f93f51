//! REST API for the recommendation service
//!
//! Thin layer over the actor handles: every handler sends one message and
//! maps the outcome to HTTP.

pub mod error;
pub mod handlers;

pub use error::{ApiError, ApiResult};

use crate::service::{DispatcherHandle, RecService, SupervisorHandle};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub supervisor: SupervisorHandle,
    pub dispatcher: DispatcherHandle,
    /// Songs returned when `count` is omitted
    pub default_count: usize,
}

impl AppState {
    pub fn new(service: &RecService, default_count: usize) -> Self {
        Self {
            supervisor: service.supervisor().clone(),
            dispatcher: service.dispatcher().clone(),
            default_count,
        }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .nest(
            "/api/v1",
            Router::new()
                // Training data
                .route("/users", post(handlers::add_user))
                .route("/songs", post(handlers::add_song))
                .route("/ratings", post(handlers::add_rating))
                // Model lifecycle
                .route("/retrain", post(handlers::retrain))
                // Serving
                .route("/recommendations/:user_id", get(handlers::recommendations)),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
