use crate::{
    AppState,
    auth::AuthUser,
    catalog::{self, FeatureInfo},
    error::{AppError, ErrorBody},
    models::{
        Listing, ListingForm, ListingStatus, ManagedListings, Profile, PublicConfig,
        SessionResponse, UpdateRoleRequest, UpdateStatusRequest, UserDirectory,
    },
    pagination::{LISTINGS_PER_PAGE, Page, PageRequest, USERS_PER_PAGE},
    search,
    session::Session,
    storage::{self, UploadFile},
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Redirect,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Number of listings on the home page's featured strip.
pub const FEATURED_LIMIT: i64 = 6;

// --- Query Structs ---

/// PageQuery
///
/// `?page=k`, 1-based. A missing or zero page means the first page.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    #[serde(default)]
    pub page: u32,
}

/// ManageQuery
///
/// Query parameters of the management grid. `status` is applied in SQL,
/// `search` in-process over the fetched set.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ManageQuery {
    pub status: Option<ListingStatus>,
    pub search: Option<String>,
    #[serde(default)]
    pub page: u32,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct UserQuery {
    pub search: Option<String>,
    #[serde(default)]
    pub page: u32,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct LoginQuery {
    /// Where the auth platform sends the browser after sign-in. Defaults to `SITE_URL`.
    pub redirect_to: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct DeleteQuery {
    /// Must be `true`; hard deletes are never implicit.
    #[serde(default)]
    pub confirm: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when required settings are missing.
    pub status: String,
    pub missing: Vec<String>,
}

// --- Guards ---

fn require_seller(session: &Session) -> Result<(), AppError> {
    if session.capabilities.is_seller {
        Ok(())
    } else {
        Err(AppError::Forbidden("listing management requires seller"))
    }
}

fn require_admin(session: &Session) -> Result<(), AppError> {
    if session.capabilities.is_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden("role management requires admin"))
    }
}

// --- Health & Configuration ---

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Liveness and configuration state", body = HealthResponse))
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: if state.config.is_degraded() { "degraded" } else { "ok" }.to_string(),
        missing: state.config.missing.clone(),
    })
}

/// public_config
///
/// [Public Route] Platform values a browser client needs, plus the names of
/// any that are missing so the client can render its broken state.
#[utoipa::path(
    get,
    path = "/config",
    responses((status = 200, description = "Client configuration", body = PublicConfig))
)]
pub async fn public_config(State(state): State<AppState>) -> Json<PublicConfig> {
    Json(state.config.public())
}

// --- Session ---

/// get_session
///
/// [Public Route] The resolved session for the presented token, or the
/// anonymous session when no credentials are sent. An invalid token is a 401.
#[utoipa::path(
    get,
    path = "/session",
    responses(
        (status = 200, description = "Current session", body = SessionResponse),
        (status = 401, description = "Token rejected")
    )
)]
pub async fn get_session(user: Option<AuthUser>) -> Json<SessionResponse> {
    Json(match user {
        Some(user) => user.session.response(),
        None => SessionResponse::anonymous(),
    })
}

/// login
///
/// [Public Route] Starts the Google sign-in by redirecting to the platform's
/// authorize endpoint.
#[utoipa::path(
    get,
    path = "/auth/login",
    params(LoginQuery),
    responses(
        (status = 303, description = "Redirect to the Google consent screen"),
        (status = 503, description = "Auth platform not configured", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Result<Redirect, AppError> {
    let redirect_to = query
        .redirect_to
        .unwrap_or_else(|| state.config.site_url.clone());
    state
        .identity
        .authorize_url(&redirect_to)
        .map(|url| Redirect::to(&url))
        .ok_or_else(|| AppError::Misconfigured("SUPABASE_URL".to_string()))
}

/// logout
///
/// [Authenticated Route] Revokes the remote session. The response is the
/// anonymous session even when the revocation call fails; the failure is logged.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 200, description = "Signed out", body = SessionResponse))
)]
pub async fn logout(user: AuthUser, State(state): State<AppState>) -> Json<SessionResponse> {
    if let Some(token) = user.access_token.as_deref() {
        if let Err(e) = state.identity.sign_out(token).await {
            tracing::warn!(operation = "sign_out", profile_id = %user.id(), error = %e, "remote sign-out failed");
        }
    }
    tracing::info!(profile_id = %user.id(), "signed out");
    Json(SessionResponse::anonymous())
}

// --- Public Listings ---

/// list_public_listings
///
/// [Public Route] Available listings, newest first, 12 per page. Zero rows is
/// a normal empty page; a backend failure is a 503 with `retryable: true`.
#[utoipa::path(
    get,
    path = "/listings",
    params(PageQuery),
    responses(
        (status = 200, description = "One page of available listings", body = Page<Listing>),
        (status = 503, description = "Listings could not be read", body = ErrorBody)
    )
)]
pub async fn list_public_listings(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<Listing>>, AppError> {
    let page = state
        .repo
        .list_public_listings(PageRequest::new(query.page, LISTINGS_PER_PAGE))
        .await
        .map_err(AppError::read("list_public_listings"))?;
    Ok(Json(page))
}

#[utoipa::path(
    get,
    path = "/listings/{id}",
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Found", body = Listing),
        (status = 404, description = "Missing or not available", body = ErrorBody)
    )
)]
pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Listing>, AppError> {
    state
        .repo
        .get_public_listing(id)
        .await
        .map_err(AppError::read("get_public_listing"))?
        .map(Json)
        .ok_or(AppError::NotFound)
}

#[utoipa::path(
    get,
    path = "/listings/featured",
    responses((status = 200, description = "Featured available listings", body = [Listing]))
)]
pub async fn featured_listings(
    State(state): State<AppState>,
) -> Result<Json<Vec<Listing>>, AppError> {
    let listings = state
        .repo
        .list_featured_listings(FEATURED_LIMIT)
        .await
        .map_err(AppError::read("list_featured_listings"))?;
    Ok(Json(listings))
}

#[utoipa::path(
    get,
    path = "/listings/features",
    responses((status = 200, description = "Feature catalogue", body = [FeatureInfo]))
)]
pub async fn feature_catalogue() -> Json<Vec<FeatureInfo>> {
    Json(catalog::catalogue())
}

// --- Listing Management ---

/// list_managed_listings
///
/// [Authenticated Route] The management grid. Sellers see their own listings,
/// admins see all. Stats are computed over the fetched set before search.
#[utoipa::path(
    get,
    path = "/manage/listings",
    params(ManageQuery),
    responses(
        (status = 200, description = "Listings in scope", body = ManagedListings),
        (status = 403, description = "Not a seller", body = ErrorBody)
    )
)]
pub async fn list_managed_listings(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<ManageQuery>,
) -> Result<Json<ManagedListings>, AppError> {
    require_seller(&user.session)?;
    let listings = state
        .repo
        .list_managed_listings(user.session.listing_scope(), query.status)
        .await
        .map_err(AppError::read("list_managed_listings"))?;

    let stats = search::listing_stats(&listings);
    let filtered = search::filter_listings(listings, query.search.as_deref());
    let page = PageRequest::new(query.page, LISTINGS_PER_PAGE).slice(&filtered);
    Ok(Json(ManagedListings { page, stats }))
}

/// get_managed_listing
///
/// [Authenticated Route] A listing in scope, in any status, as the edit form
/// is pre-filled from it.
#[utoipa::path(
    get,
    path = "/manage/listings/{id}",
    params(("id" = Uuid, Path, description = "Listing ID")),
    responses(
        (status = 200, description = "Editable form", body = ListingForm),
        (status = 404, description = "Missing or out of scope", body = ErrorBody)
    )
)]
pub async fn get_managed_listing(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ListingForm>, AppError> {
    require_seller(&user.session)?;
    let listing = state
        .repo
        .get_managed_listing(id, user.session.listing_scope())
        .await
        .map_err(AppError::read("get_managed_listing"))?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ListingForm::from_listing(&listing)))
}

/// Splits a listing submit into the `listing` JSON part and its `images` files.
async fn read_submission(
    mut multipart: Multipart,
) -> Result<(ListingForm, Vec<UploadFile>), AppError> {
    let mut form = None;
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("listing") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                let parsed = serde_json::from_slice::<ListingForm>(&bytes)
                    .map_err(|e| AppError::BadRequest(format!("invalid 'listing' part: {e}")))?;
                form = Some(parsed);
            }
            Some("images") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.body_text()))?;
                // Browsers send an empty part for an untouched file input.
                if bytes.is_empty() {
                    continue;
                }
                files.push(UploadFile {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            other => tracing::debug!(field = ?other, "ignoring unknown multipart field"),
        }
    }

    let form = form.ok_or_else(|| AppError::BadRequest("missing 'listing' part".to_string()))?;
    Ok((form, files))
}

/// create_listing
///
/// [Authenticated Route] Validates the form, uploads the images one by one
/// (failures are skipped), then writes the row. Uploads that precede a failed
/// write are left in the bucket.
#[utoipa::path(
    post,
    path = "/manage/listings",
    request_body(content = ListingForm, content_type = "multipart/form-data",
        description = "`listing` JSON part plus zero or more `images` file parts"),
    responses(
        (status = 201, description = "Created", body = Listing),
        (status = 422, description = "Invalid form", body = ErrorBody),
        (status = 500, description = "Write failed", body = ErrorBody)
    )
)]
pub async fn create_listing(
    user: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Listing>), AppError> {
    require_seller(&user.session)?;
    let (mut form, files) = read_submission(multipart).await?;
    // A new listing has nothing to keep.
    form.existing_images.clear();
    let mut draft = form.into_draft(Vec::new())?;

    draft.images = storage::upload_images(state.storage.as_ref(), user.id(), files).await;
    let listing = state
        .repo
        .create_listing(draft, user.id())
        .await
        .map_err(AppError::write("create_listing"))?;

    tracing::info!(listing_id = %listing.id, images = listing.images.len(), "listing created");
    Ok((StatusCode::CREATED, Json(listing)))
}

/// update_listing
///
/// [Authenticated Route] Same pipeline as create. The final image list is the
/// kept `existing_images` followed by the new uploads.
#[utoipa::path(
    put,
    path = "/manage/listings/{id}",
    params(("id" = Uuid, Path, description = "Listing ID")),
    request_body(content = ListingForm, content_type = "multipart/form-data",
        description = "`listing` JSON part plus zero or more `images` file parts"),
    responses(
        (status = 200, description = "Updated", body = Listing),
        (status = 404, description = "Missing or out of scope", body = ErrorBody),
        (status = 422, description = "Invalid form", body = ErrorBody),
        (status = 500, description = "Write failed", body = ErrorBody)
    )
)]
pub async fn update_listing(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<Listing>, AppError> {
    require_seller(&user.session)?;
    let scope = user.session.listing_scope();
    let current = state
        .repo
        .get_managed_listing(id, scope)
        .await
        .map_err(AppError::read("get_managed_listing"))?
        .ok_or(AppError::NotFound)?;

    let (mut form, files) = read_submission(multipart).await?;
    let kept = form.take_kept_images(&current.images);
    let mut draft = form.into_draft(kept)?;

    let uploaded = storage::upload_images(state.storage.as_ref(), user.id(), files).await;
    draft.images.extend(uploaded);

    let listing = state
        .repo
        .update_listing(id, scope, draft)
        .await
        .map_err(AppError::write("update_listing"))?
        .ok_or(AppError::NotFound)?;

    tracing::info!(listing_id = %listing.id, "listing updated");
    Ok(Json(listing))
}

/// set_listing_status
///
/// [Authenticated Route] Status change; moving a listing off `available` is the
/// soft delete.
#[utoipa::path(
    patch,
    path = "/manage/listings/{id}/status",
    params(("id" = Uuid, Path, description = "Listing ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated", body = Listing),
        (status = 404, description = "Missing or out of scope", body = ErrorBody)
    )
)]
pub async fn set_listing_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Listing>, AppError> {
    require_seller(&user.session)?;
    let listing = state
        .repo
        .set_listing_status(id, user.session.listing_scope(), payload.status)
        .await
        .map_err(AppError::write("set_listing_status"))?
        .ok_or(AppError::NotFound)?;

    tracing::info!(listing_id = %listing.id, status = %listing.status, "listing status changed");
    Ok(Json(listing))
}

/// delete_listing
///
/// [Authenticated Route] Hard delete. Refused with 400 unless `confirm=true`.
/// Stored images are not removed.
#[utoipa::path(
    delete,
    path = "/manage/listings/{id}",
    params(("id" = Uuid, Path, description = "Listing ID"), DeleteQuery),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Confirmation missing", body = ErrorBody),
        (status = 404, description = "Missing or out of scope", body = ErrorBody)
    )
)]
pub async fn delete_listing(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> Result<StatusCode, AppError> {
    require_seller(&user.session)?;
    if !query.confirm {
        return Err(AppError::ConfirmationRequired);
    }
    let deleted = state
        .repo
        .delete_listing(id, user.session.listing_scope())
        .await
        .map_err(AppError::write("delete_listing"))?;

    if deleted {
        tracing::info!(listing_id = %id, "listing deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

// --- Role Management ---

/// list_users
///
/// [Admin Route] The user directory, newest first, 10 per page, with role
/// counts over the whole directory.
#[utoipa::path(
    get,
    path = "/admin/users",
    params(UserQuery),
    responses(
        (status = 200, description = "User directory", body = UserDirectory),
        (status = 403, description = "Not an admin", body = ErrorBody)
    )
)]
pub async fn list_users(
    user: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<UserDirectory>, AppError> {
    require_admin(&user.session)?;
    let profiles = state
        .repo
        .list_profiles()
        .await
        .map_err(AppError::read("list_profiles"))?;

    let stats = search::role_stats(&profiles);
    let filtered = search::filter_profiles(profiles, query.search.as_deref());
    let page = PageRequest::new(query.page, USERS_PER_PAGE).slice(&filtered);
    Ok(Json(UserDirectory { page, stats }))
}

/// update_user_role
///
/// [Admin Route] Immediate role write. Only a configurator may grant
/// configurator or touch an existing configurator; anything else by an admin
/// is allowed. A refusal writes nothing.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "Profile ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Updated profile", body = Profile),
        (status = 403, description = "Assignment not permitted", body = ErrorBody),
        (status = 404, description = "No such profile", body = ErrorBody)
    )
)]
pub async fn update_user_role(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<Profile>, AppError> {
    require_admin(&user.session)?;
    let target = state
        .repo
        .get_profile(id)
        .await
        .map_err(AppError::read("get_profile"))?
        .ok_or(AppError::NotFound)?;

    user.session
        .role()
        .may_assign(target.role, payload.role)
        .map_err(AppError::Forbidden)?;

    let updated = state
        .repo
        .set_role(id, payload.role)
        .await
        .map_err(AppError::write("set_role"))?
        .ok_or(AppError::NotFound)?;

    tracing::info!(
        actor = %user.id(),
        profile_id = %updated.id,
        from = %target.role,
        to = %updated.role,
        "role changed"
    );
    Ok(Json(updated))
}
