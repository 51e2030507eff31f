mod common;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use casa_portal::{
    error::ErrorBody,
    handlers::{self, DeleteQuery, LoginQuery, ManageQuery, PageQuery, UserQuery},
    models::{ListingStatus, Role, UpdateRoleRequest, UpdateStatusRequest},
};
use common::{
    InMemoryRepository, MockIdentityProvider, auth_user, listing, listing_with_status, profile,
    test_state, test_state_with,
};
use casa_portal::storage::MockStorageService;
use std::sync::Arc;
use uuid::Uuid;

async fn error_body(response: axum::response::Response) -> ErrorBody {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// --- Public Listings ---

#[tokio::test]
async fn test_public_listings_hide_non_available_and_order_newest_first() {
    let owner = Uuid::new_v4();
    let repo = Arc::new(InMemoryRepository::with(
        vec![],
        vec![
            listing(owner, "Antigo", "Lisboa", 30),
            listing_with_status(owner, "Vendido", ListingStatus::Sold, 1),
            listing(owner, "Novo", "Lisboa", 2),
            listing_with_status(owner, "Pendente", ListingStatus::Pending, 3),
        ],
    ));

    let Json(page) = handlers::list_public_listings(
        State(test_state(repo)),
        Query(PageQuery { page: 1 }),
    )
    .await
    .unwrap();

    let titles: Vec<&str> = page.items.iter().map(|l| l.title.as_str()).collect();
    assert_eq!(titles, vec!["Novo", "Antigo"]);
    assert_eq!(page.total, 2);
    assert_eq!(page.per_page, 12);
}

#[tokio::test]
async fn test_public_listings_empty_is_a_normal_page() {
    let Json(page) = handlers::list_public_listings(
        State(test_state(Arc::new(InMemoryRepository::new()))),
        Query(PageQuery::default()),
    )
    .await
    .unwrap();

    assert!(page.is_empty());
    assert_eq!(page.page, 1);
    assert_eq!(page.total_pages, 0);
}

#[tokio::test]
async fn test_public_listings_failure_is_distinct_and_retryable() {
    let state = test_state(Arc::new(InMemoryRepository::new().failing_reads()));

    let err = handlers::list_public_listings(State(state), Query(PageQuery { page: 2 }))
        .await
        .unwrap_err();
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = error_body(response).await;
    assert_eq!(body.error, "read_failed");
    assert!(body.retryable);
    assert!(body.message.contains("connection refused"));
}

#[tokio::test]
async fn test_get_listing_404_for_non_available() {
    let owner = Uuid::new_v4();
    let sold = listing_with_status(owner, "Vendido", ListingStatus::Sold, 1);
    let open = listing(owner, "Aberto", "Évora", 1);
    let state = test_state(Arc::new(InMemoryRepository::with(
        vec![],
        vec![sold.clone(), open.clone()],
    )));

    let Json(found) = handlers::get_listing(State(state.clone()), Path(open.id))
        .await
        .unwrap();
    assert_eq!(found.id, open.id);

    let err = handlers::get_listing(State(state), Path(sold.id))
        .await
        .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_featured_listings_are_available_and_capped() {
    let owner = Uuid::new_v4();
    let mut listings: Vec<_> = (0..8)
        .map(|i| {
            let mut l = listing(owner, &format!("Destaque {i}"), "Lagos", i);
            l.featured = true;
            l
        })
        .collect();
    listings[0].status = ListingStatus::Rented;

    let Json(featured) = handlers::featured_listings(State(test_state(Arc::new(
        InMemoryRepository::with(vec![], listings),
    ))))
    .await
    .unwrap();

    assert_eq!(featured.len(), 6);
    assert!(featured.iter().all(|l| l.status == ListingStatus::Available && l.featured));
}

#[tokio::test]
async fn test_feature_catalogue_lists_thirty_entries() {
    let Json(catalogue) = handlers::feature_catalogue().await;
    assert_eq!(catalogue.len(), 30);
}

// --- Session & Auth ---

#[tokio::test]
async fn test_session_without_credentials_is_anonymous() {
    let Json(session) = handlers::get_session(None).await;
    assert!(session.profile.is_none());
    assert!(!session.capabilities.is_admin);
}

#[tokio::test]
async fn test_login_redirects_to_google_authorize() {
    let state = test_state(Arc::new(InMemoryRepository::new()));
    let response = handlers::login(
        State(state),
        Query(LoginQuery {
            redirect_to: Some("http://localhost:5173/#users".to_string()),
        }),
    )
    .await
    .unwrap()
    .into_response();

    assert!(response.status().is_redirection());
    let location = response.headers()[header::LOCATION].to_str().unwrap();
    assert!(location.contains("provider=google"));
}

#[tokio::test]
async fn test_logout_revokes_token_and_returns_anonymous() {
    let provider = MockIdentityProvider::default();
    let repo = Arc::new(InMemoryRepository::new());
    let state = test_state_with(repo, MockStorageService::new(), provider);
    let user = auth_user(&profile(Role::Seller));

    let Json(session) = handlers::logout(user, State(state)).await;
    assert!(session.profile.is_none());
    assert!(!session.capabilities.is_seller);
}

// --- Listing Management ---

#[tokio::test]
async fn test_plain_user_cannot_manage_listings() {
    let state = test_state(Arc::new(InMemoryRepository::new()));
    let err = handlers::list_managed_listings(
        auth_user(&profile(Role::User)),
        State(state),
        Query(ManageQuery::default()),
    )
    .await
    .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_seller_sees_only_own_listings_admin_sees_all() {
    let seller = profile(Role::Seller);
    let admin = profile(Role::Admin);
    let other = Uuid::new_v4();
    let mine = listing(seller.id, "Meu T1", "Lisboa", 1);
    let mut mine_sold = listing(seller.id, "Meu T2", "Lisboa", 2);
    mine_sold.status = ListingStatus::Sold;
    let theirs = listing(other, "Outro T3", "Lisboa", 3);
    let state = test_state(Arc::new(InMemoryRepository::with(
        vec![seller.clone(), admin.clone()],
        vec![mine.clone(), mine_sold.clone(), theirs.clone()],
    )));

    let Json(seller_view) = handlers::list_managed_listings(
        auth_user(&seller),
        State(state.clone()),
        Query(ManageQuery::default()),
    )
    .await
    .unwrap();
    assert_eq!(seller_view.page.total, 2);
    assert!(seller_view.page.items.iter().all(|l| l.created_by == seller.id));
    assert_eq!(seller_view.stats.sold, 1);
    assert_eq!(seller_view.stats.available, 1);

    let Json(admin_view) = handlers::list_managed_listings(
        auth_user(&admin),
        State(state.clone()),
        Query(ManageQuery {
            status: Some(ListingStatus::Available),
            search: Some("t3".to_string()),
            page: 1,
        }),
    )
    .await
    .unwrap();
    assert_eq!(admin_view.page.items.len(), 1);
    assert_eq!(admin_view.page.items[0].id, theirs.id);
    assert_eq!(admin_view.stats.total, 2);
}

#[tokio::test]
async fn test_seller_cannot_touch_another_sellers_listing() {
    let seller = profile(Role::Seller);
    let theirs = listing(Uuid::new_v4(), "Alheio", "Coimbra", 1);
    let repo = Arc::new(InMemoryRepository::with(vec![seller.clone()], vec![theirs.clone()]));
    let state = test_state(repo.clone());

    let err = handlers::set_listing_status(
        auth_user(&seller),
        State(state.clone()),
        Path(theirs.id),
        Json(UpdateStatusRequest {
            status: ListingStatus::Sold,
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

    let err = handlers::delete_listing(
        auth_user(&seller),
        State(state),
        Path(theirs.id),
        Query(DeleteQuery { confirm: true }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    assert_eq!(repo.listing(theirs.id).unwrap().status, ListingStatus::Available);
}

#[tokio::test]
async fn test_status_change_is_the_soft_delete() {
    let seller = profile(Role::Seller);
    let mine = listing(seller.id, "T2", "Aveiro", 1);
    let repo = Arc::new(InMemoryRepository::with(vec![seller.clone()], vec![mine.clone()]));
    let state = test_state(repo.clone());

    let Json(updated) = handlers::set_listing_status(
        auth_user(&seller),
        State(state.clone()),
        Path(mine.id),
        Json(UpdateStatusRequest {
            status: ListingStatus::Sold,
        }),
    )
    .await
    .unwrap();
    assert_eq!(updated.status, ListingStatus::Sold);

    let Json(public) =
        handlers::list_public_listings(State(state), Query(PageQuery::default()))
            .await
            .unwrap();
    assert!(public.is_empty());
    assert!(repo.listing(mine.id).is_some());
}

#[tokio::test]
async fn test_hard_delete_requires_confirmation() {
    let seller = profile(Role::Seller);
    let mine = listing(seller.id, "T0", "Setúbal", 1);
    let repo = Arc::new(InMemoryRepository::with(vec![seller.clone()], vec![mine.clone()]));
    let state = test_state(repo.clone());

    let err = handlers::delete_listing(
        auth_user(&seller),
        State(state.clone()),
        Path(mine.id),
        Query(DeleteQuery { confirm: false }),
    )
    .await
    .unwrap_err();
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_body(response).await.error, "confirmation_required");
    assert!(repo.listing(mine.id).is_some());

    let status = handlers::delete_listing(
        auth_user(&seller),
        State(state),
        Path(mine.id),
        Query(DeleteQuery { confirm: true }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(repo.listing(mine.id).is_none());
}

#[tokio::test]
async fn test_write_failure_hides_backend_detail() {
    let seller = profile(Role::Seller);
    let mine = listing(seller.id, "T2", "Viseu", 1);
    let state = test_state(Arc::new(
        InMemoryRepository::with(vec![seller.clone()], vec![mine.clone()]).failing_writes(),
    ));

    let err = handlers::set_listing_status(
        auth_user(&seller),
        State(state),
        Path(mine.id),
        Json(UpdateStatusRequest {
            status: ListingStatus::Rented,
        }),
    )
    .await
    .unwrap_err();
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = error_body(response).await;
    assert_eq!(body.error, "write_failed");
    assert!(!body.message.contains("connection refused"));
}

// --- Role Management ---

#[tokio::test]
async fn test_user_directory_requires_admin_and_paginates_by_ten() {
    let admin = profile(Role::Admin);
    let mut profiles: Vec<_> = (0..14).map(|_| profile(Role::User)).collect();
    profiles.push(admin.clone());
    let state = test_state(Arc::new(InMemoryRepository::with(profiles, vec![])));

    let err = handlers::list_users(
        auth_user(&profile(Role::Seller)),
        State(state.clone()),
        Query(UserQuery::default()),
    )
    .await
    .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

    let Json(directory) = handlers::list_users(
        auth_user(&admin),
        State(state),
        Query(UserQuery {
            search: None,
            page: 2,
        }),
    )
    .await
    .unwrap();
    assert_eq!(directory.page.items.len(), 5);
    assert_eq!(directory.page.total_pages, 2);
    assert_eq!(directory.stats.users, 14);
    assert_eq!(directory.stats.privileged, 1);
}

#[tokio::test]
async fn test_admin_promotes_user_to_seller() {
    let admin = profile(Role::Admin);
    let target = profile(Role::User);
    let repo = Arc::new(InMemoryRepository::with(
        vec![admin.clone(), target.clone()],
        vec![],
    ));

    let Json(updated) = handlers::update_user_role(
        auth_user(&admin),
        State(test_state(repo.clone())),
        Path(target.id),
        Json(UpdateRoleRequest { role: Role::Seller }),
    )
    .await
    .unwrap();

    assert_eq!(updated.role, Role::Seller);
    assert_eq!(repo.profile(target.id).unwrap().role, Role::Seller);
}

#[tokio::test]
async fn test_admin_cannot_grant_or_revoke_configurator() {
    let admin = profile(Role::Admin);
    let user = profile(Role::User);
    let configurator = profile(Role::Configurator);
    let repo = Arc::new(InMemoryRepository::with(
        vec![admin.clone(), user.clone(), configurator.clone()],
        vec![],
    ));
    let state = test_state(repo.clone());

    let err = handlers::update_user_role(
        auth_user(&admin),
        State(state.clone()),
        Path(user.id),
        Json(UpdateRoleRequest {
            role: Role::Configurator,
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

    let err = handlers::update_user_role(
        auth_user(&admin),
        State(state),
        Path(configurator.id),
        Json(UpdateRoleRequest { role: Role::User }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);

    assert_eq!(repo.profile(user.id).unwrap().role, Role::User);
    assert_eq!(repo.profile(configurator.id).unwrap().role, Role::Configurator);
}

#[tokio::test]
async fn test_configurator_can_grant_configurator() {
    let configurator = profile(Role::Configurator);
    let admin = profile(Role::Admin);
    let repo = Arc::new(InMemoryRepository::with(
        vec![configurator.clone(), admin.clone()],
        vec![],
    ));

    let Json(updated) = handlers::update_user_role(
        auth_user(&configurator),
        State(test_state(repo)),
        Path(admin.id),
        Json(UpdateRoleRequest {
            role: Role::Configurator,
        }),
    )
    .await
    .unwrap();
    assert_eq!(updated.role, Role::Configurator);
}

#[tokio::test]
async fn test_role_update_for_unknown_profile_is_404() {
    let admin = profile(Role::Admin);
    let state = test_state(Arc::new(InMemoryRepository::with(vec![admin.clone()], vec![])));

    let err = handlers::update_user_role(
        auth_user(&admin),
        State(state),
        Path(Uuid::new_v4()),
        Json(UpdateRoleRequest { role: Role::Seller }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
}
