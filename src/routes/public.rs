use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Unauthenticated endpoints outside the `/api` prefix.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness and database status for monitoring and load balancers.
        .route("/health", get(handlers::health))
}

/// Unauthenticated endpoints nested under `/api`.
pub fn public_api_routes() -> Router<AppState> {
    Router::new()
        // POST /api/register
        // Creates a user and hands back a bearer token. 404 when disabled.
        .route("/register", post(handlers::register_user))
}
