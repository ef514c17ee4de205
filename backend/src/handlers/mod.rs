pub mod auth;
pub mod connections;

use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::services::ConnectionManager;

pub use auth::Auth;

#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<ConnectionManager>,
}

impl AppState {
    pub fn new(manager: ConnectionManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }
}

/// Connection API routes. CORS and tracing layers are added by the server binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/connections",
            get(connections::list).post(connections::send_request),
        )
        .route("/api/connections/{id}", delete(connections::remove))
        .route("/api/connections/{id}/accept", post(connections::accept))
        .route("/api/connections/{id}/decline", post(connections::decline))
        .route("/api/connections/{id}/cancel", post(connections::cancel))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
