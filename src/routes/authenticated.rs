use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, patch, post},
};

/// Upper bound on a listing submit (form plus all photos).
const LISTING_UPLOAD_LIMIT: usize = 25 * 1024 * 1024;

/// Authenticated Router Module
///
/// Routes that need a verified session. The router-level auth layer rejects
/// anonymous requests with 401; the handlers then check capabilities (seller
/// for listing management) and the repository scopes every query and write
/// to the actor's own listings unless the actor is an admin.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /auth/logout
        // Revokes the platform session and returns the anonymous session.
        .route("/auth/logout", post(handlers::logout))
        // GET/POST /manage/listings
        // Scoped management grid, and multipart create (`listing` + `images`).
        .route(
            "/manage/listings",
            get(handlers::list_managed_listings).post(handlers::create_listing),
        )
        // GET/PUT/DELETE /manage/listings/{id}
        // Edit form, multipart update, and confirmed hard delete.
        .route(
            "/manage/listings/{id}",
            get(handlers::get_managed_listing)
                .put(handlers::update_listing)
                .delete(handlers::delete_listing),
        )
        // PATCH /manage/listings/{id}/status
        // Soft delete by status change.
        .route(
            "/manage/listings/{id}/status",
            patch(handlers::set_listing_status),
        )
        .layer(DefaultBodyLimit::max(LISTING_UPLOAD_LIMIT))
}
