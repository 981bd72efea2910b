use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Everything here is nested under `/api` and wrapped in the auth middleware by
/// `create_router`, so every handler receives a resolved `AuthUser`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/user
        // The principal's own profile.
        .route("/user", get(handlers::get_me))
        // GET/POST /api/songs
        // Paginated listing (optional `genre`, `page`) and creation.
        .route(
            "/songs",
            get(handlers::list_songs).post(handlers::create_song),
        )
        // GET/PUT/DELETE /api/songs/{id}
        // Mutations are limited to the owner or an admin inside the handlers.
        .route(
            "/songs/{id}",
            get(handlers::get_song)
                .put(handlers::update_song)
                .delete(handlers::delete_song),
        )
}
