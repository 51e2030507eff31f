use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// Role management, nested under `/admin`. The auth layer applied in
/// `create_router` guarantees a session; the handlers require `is_admin` and
/// apply the configurator rules before anything is written.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/users?search=...&page=k
        // User directory with role counts.
        .route("/users", get(handlers::list_users))
        // PUT /admin/users/{id}/role
        // Immediate single-profile role write.
        .route("/users/{id}/role", put(handlers::update_user_role))
}
