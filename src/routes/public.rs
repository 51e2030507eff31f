use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable without a session. Listing reads here only ever return
/// `status = available` rows; that filter lives in the repository queries.
/// `/session` accepts an optional bearer token and answers with the anonymous
/// session when none is sent.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // "ok", or "degraded" with the names of missing platform settings.
        .route("/health", get(handlers::health))
        // GET /config
        // Platform values the browser client needs to initialize.
        .route("/config", get(handlers::public_config))
        .route("/session", get(handlers::get_session))
        // GET /auth/login?redirect_to=...
        // Redirects to the Google consent screen via the auth platform.
        .route("/auth/login", get(handlers::login))
        // GET /listings?page=k
        .route("/listings", get(handlers::list_public_listings))
        .route("/listings/featured", get(handlers::featured_listings))
        .route("/listings/features", get(handlers::feature_catalogue))
        .route("/listings/{id}", get(handlers::get_listing))
}
