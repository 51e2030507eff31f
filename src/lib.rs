use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Domain types and pure logic.
pub mod catalog;
pub mod forms;
pub mod models;
pub mod pagination;
pub mod search;

// Services behind trait seams.
pub mod identity;
pub mod repository;
pub mod storage;

// Session resolution, request authentication and client-side view state.
pub mod auth;
pub mod session;
pub mod view;

pub mod config;
pub mod error;
pub mod handlers;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use identity::{IdentityState, SupabaseAuthClient};
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document for every route, served at `/api-docs/openapi.json` and
/// browsable at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::public_config, handlers::get_session, handlers::login,
        handlers::logout, handlers::list_public_listings, handlers::get_listing,
        handlers::featured_listings, handlers::feature_catalogue,
        handlers::list_managed_listings, handlers::get_managed_listing,
        handlers::create_listing, handlers::update_listing, handlers::set_listing_status,
        handlers::delete_listing, handlers::list_users, handlers::update_user_role
    ),
    components(
        schemas(
            models::Role, models::Capabilities, models::Profile, models::RoleStats,
            models::PriceType, models::PropertyType, models::ListingStatus, models::Listing,
            models::ListingStats, models::ListingForm, models::UpdateRoleRequest,
            models::UpdateStatusRequest, models::SessionResponse, models::ManagedListings,
            models::UserDirectory, models::PublicConfig, catalog::Feature, catalog::FeatureInfo,
            error::ErrorBody, handlers::HealthResponse,
        )
    ),
    tags(
        (name = "casa-portal", description = "Real-estate listings and role management API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The shared, immutable container of every service a handler may need.
/// Handlers take the whole state; extractors pull single services through
/// the `FromRef` impls below.
#[derive(Clone)]
pub struct AppState {
    /// Profiles and listings (Postgres in production).
    pub repo: RepositoryState,
    /// Listing image bucket.
    pub storage: StorageState,
    /// Hosted auth service (OAuth redirect, sign-out).
    pub identity: IdentityState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for IdentityState {
    fn from_ref(app_state: &AppState) -> IdentityState {
        app_state.identity.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Route layer for protected modules. Extracting `AuthUser` verifies the
/// token and resolves the session; a failure rejects with 401 before the
/// handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing tree, the scoped auth layer and the observability
/// stack, and binds the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/admin",
            admin::admin_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Opens the per-request span carrying the method, URI and `x-request-id`,
/// so every log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
