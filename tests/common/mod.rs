#![allow(dead_code)]

use async_trait::async_trait;
use casa_portal::{
    AppState,
    auth::{AuthUser, Claims, TOKEN_AUDIENCE},
    config::AppConfig,
    error::RepoError,
    identity::{AuthError, Identity, IdentityProvider, UserMetadata},
    models::{
        Listing, ListingDraft, ListingStatus, NewProfile, PriceType, Profile, PropertyType, Role,
    },
    pagination::{Page, PageRequest},
    repository::{ListingScope, Repository},
    session::Session,
    storage::MockStorageService,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime},
};
use uuid::Uuid;

// --- In-Memory Repository ---

/// Behaves like the Postgres repository (ordering, scoping, available-only
/// public reads) and can be told to fail reads or writes.
#[derive(Default)]
pub struct InMemoryRepository {
    pub profiles: Mutex<Vec<Profile>>,
    pub listings: Mutex<Vec<Listing>>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    /// Artificial latency of `list_public_listings` per page number.
    pub page_delays: Mutex<HashMap<u32, Duration>>,
    pub profiles_created: AtomicUsize,
}

fn outage() -> RepoError {
    RepoError::Unavailable("connection refused (simulated)".to_string())
}

fn in_scope(listing: &Listing, scope: ListingScope) -> bool {
    match scope {
        ListingScope::All => true,
        ListingScope::OwnedBy(owner) => listing.created_by == owner,
    }
}

fn newest_first(mut listings: Vec<Listing>) -> Vec<Listing> {
    listings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    listings
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(profiles: Vec<Profile>, listings: Vec<Listing>) -> Self {
        Self {
            profiles: Mutex::new(profiles),
            listings: Mutex::new(listings),
            ..Self::default()
        }
    }

    pub fn failing_reads(self) -> Self {
        self.fail_reads.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_writes(self) -> Self {
        self.fail_writes.store(true, Ordering::SeqCst);
        self
    }

    pub fn delay_page(&self, page: u32, delay: Duration) {
        self.page_delays.lock().unwrap().insert(page, delay);
    }

    pub fn listing(&self, id: Uuid) -> Option<Listing> {
        self.listings.lock().unwrap().iter().find(|l| l.id == id).cloned()
    }

    pub fn profile(&self, id: Uuid) -> Option<Profile> {
        self.profiles.lock().unwrap().iter().find(|p| p.id == id).cloned()
    }

    fn check_read(&self) -> Result<(), RepoError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(outage());
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), RepoError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(outage());
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, RepoError> {
        self.check_read()?;
        Ok(self.profile(id))
    }

    async fn create_profile(&self, new: NewProfile) -> Result<Profile, RepoError> {
        self.check_write()?;
        let mut profiles = self.profiles.lock().unwrap();
        if let Some(existing) = profiles.iter().find(|p| p.id == new.id) {
            return Ok(existing.clone());
        }
        let profile = Profile {
            id: new.id,
            email: new.email,
            name: new.name,
            avatar_url: new.avatar_url,
            role: new.role,
            created_at: Utc::now(),
        };
        profiles.push(profile.clone());
        self.profiles_created.fetch_add(1, Ordering::SeqCst);
        Ok(profile)
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, RepoError> {
        self.check_read()?;
        let mut profiles = self.profiles.lock().unwrap().clone();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(profiles)
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<Profile>, RepoError> {
        self.check_write()?;
        let mut profiles = self.profiles.lock().unwrap();
        Ok(profiles.iter_mut().find(|p| p.id == id).map(|p| {
            p.role = role;
            p.clone()
        }))
    }

    async fn list_public_listings(&self, page: PageRequest) -> Result<Page<Listing>, RepoError> {
        let delay = self.page_delays.lock().unwrap().get(&page.page()).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_read()?;
        let available: Vec<Listing> = self
            .listings
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.status == ListingStatus::Available)
            .cloned()
            .collect();
        Ok(page.slice(&newest_first(available)))
    }

    async fn get_public_listing(&self, id: Uuid) -> Result<Option<Listing>, RepoError> {
        self.check_read()?;
        Ok(self.listing(id).filter(|l| l.status == ListingStatus::Available))
    }

    async fn list_featured_listings(&self, limit: i64) -> Result<Vec<Listing>, RepoError> {
        self.check_read()?;
        let featured: Vec<Listing> = self
            .listings
            .lock()
            .unwrap()
            .iter()
            .filter(|l| l.status == ListingStatus::Available && l.featured)
            .cloned()
            .collect();
        Ok(newest_first(featured)
            .into_iter()
            .take(limit as usize)
            .collect())
    }

    async fn list_managed_listings(
        &self,
        scope: ListingScope,
        status: Option<ListingStatus>,
    ) -> Result<Vec<Listing>, RepoError> {
        self.check_read()?;
        let listings: Vec<Listing> = self
            .listings
            .lock()
            .unwrap()
            .iter()
            .filter(|l| in_scope(l, scope))
            .filter(|l| status.is_none_or(|s| l.status == s))
            .cloned()
            .collect();
        Ok(newest_first(listings))
    }

    async fn get_managed_listing(
        &self,
        id: Uuid,
        scope: ListingScope,
    ) -> Result<Option<Listing>, RepoError> {
        self.check_read()?;
        Ok(self.listing(id).filter(|l| in_scope(l, scope)))
    }

    async fn create_listing(
        &self,
        draft: ListingDraft,
        created_by: Uuid,
    ) -> Result<Listing, RepoError> {
        self.check_write()?;
        let listing = Listing {
            id: Uuid::new_v4(),
            title: draft.title,
            description: draft.description,
            location: draft.location,
            price: draft.price,
            price_type: draft.price_type,
            property_type: draft.property_type,
            bedrooms: draft.bedrooms,
            bathrooms: draft.bathrooms,
            area_sqm: draft.area_sqm,
            images: draft.images,
            features: draft.features,
            status: draft.status,
            featured: draft.featured,
            created_by,
            created_at: Utc::now(),
        };
        self.listings.lock().unwrap().push(listing.clone());
        Ok(listing)
    }

    async fn update_listing(
        &self,
        id: Uuid,
        scope: ListingScope,
        draft: ListingDraft,
    ) -> Result<Option<Listing>, RepoError> {
        self.check_write()?;
        let mut listings = self.listings.lock().unwrap();
        Ok(listings
            .iter_mut()
            .find(|l| l.id == id && in_scope(l, scope))
            .map(|l| {
                l.title = draft.title;
                l.description = draft.description;
                l.location = draft.location;
                l.price = draft.price;
                l.price_type = draft.price_type;
                l.property_type = draft.property_type;
                l.bedrooms = draft.bedrooms;
                l.bathrooms = draft.bathrooms;
                l.area_sqm = draft.area_sqm;
                l.images = draft.images;
                l.features = draft.features;
                l.status = draft.status;
                l.featured = draft.featured;
                l.clone()
            }))
    }

    async fn set_listing_status(
        &self,
        id: Uuid,
        scope: ListingScope,
        status: ListingStatus,
    ) -> Result<Option<Listing>, RepoError> {
        self.check_write()?;
        let mut listings = self.listings.lock().unwrap();
        Ok(listings
            .iter_mut()
            .find(|l| l.id == id && in_scope(l, scope))
            .map(|l| {
                l.status = status;
                l.clone()
            }))
    }

    async fn delete_listing(&self, id: Uuid, scope: ListingScope) -> Result<bool, RepoError> {
        self.check_write()?;
        let mut listings = self.listings.lock().unwrap();
        let before = listings.len();
        listings.retain(|l| !(l.id == id && in_scope(l, scope)));
        Ok(listings.len() < before)
    }
}

// --- Mock Identity Provider ---

/// Maps access tokens to identities. Unknown tokens are treated as expired.
#[derive(Default)]
pub struct MockIdentityProvider {
    pub identities: Mutex<HashMap<String, Identity>>,
    pub fail_lookup: AtomicBool,
    pub fail_sign_out: AtomicBool,
    pub signed_out: Mutex<Vec<String>>,
}

impl MockIdentityProvider {
    pub fn with_token(token: &str, identity: Identity) -> Self {
        let provider = Self::default();
        provider
            .identities
            .lock()
            .unwrap()
            .insert(token.to_string(), identity);
        provider
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    fn authorize_url(&self, redirect_to: &str) -> Option<String> {
        Some(format!(
            "http://localhost:54321/auth/v1/authorize?provider=google&redirect_to={redirect_to}"
        ))
    }

    async fn current_identity(&self, access_token: &str) -> Result<Option<Identity>, AuthError> {
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(AuthError::Rejected {
                status: 500,
                message: "auth service down".to_string(),
            });
        }
        Ok(self.identities.lock().unwrap().get(access_token).cloned())
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.signed_out
            .lock()
            .unwrap()
            .push(access_token.to_string());
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(AuthError::Rejected {
                status: 502,
                message: "bad gateway".to_string(),
            });
        }
        Ok(())
    }
}

// --- Fixtures ---

pub fn profile(role: Role) -> Profile {
    let id = Uuid::new_v4();
    Profile {
        id,
        email: format!("{}@example.pt", &id.simple().to_string()[..8]),
        name: format!("{role} {}", &id.simple().to_string()[..4]),
        avatar_url: None,
        role,
        created_at: Utc::now(),
    }
}

pub fn identity_of(profile: &Profile) -> Identity {
    Identity {
        id: profile.id,
        email: profile.email.clone(),
        name: profile.name.clone(),
        avatar_url: profile.avatar_url.clone().unwrap_or_default(),
    }
}

/// An available listing created `minutes_ago` minutes before now.
pub fn listing(owner: Uuid, title: &str, location: &str, minutes_ago: i64) -> Listing {
    Listing {
        id: Uuid::new_v4(),
        title: title.to_string(),
        description: None,
        location: location.to_string(),
        price: 250_000.0,
        price_type: PriceType::Sale,
        property_type: PropertyType::Apartment,
        bedrooms: Some(2),
        bathrooms: Some(1),
        area_sqm: Some(80),
        images: vec![],
        features: Default::default(),
        status: ListingStatus::Available,
        featured: false,
        created_by: owner,
        created_at: Utc::now() - ChronoDuration::minutes(minutes_ago),
    }
}

pub fn listing_with_status(owner: Uuid, title: &str, status: ListingStatus, minutes_ago: i64) -> Listing {
    Listing {
        status,
        ..listing(owner, title, "Porto", minutes_ago)
    }
}

/// The session a resolved request for `profile` carries.
pub fn auth_user(profile: &Profile) -> AuthUser {
    AuthUser {
        session: Session {
            capabilities: profile.capabilities(),
            profile: profile.clone(),
            degraded: false,
        },
        access_token: Some("test-access-token".to_string()),
    }
}

pub fn test_state(repo: Arc<InMemoryRepository>) -> AppState {
    test_state_with(repo, MockStorageService::new(), MockIdentityProvider::default())
}

pub fn test_state_with(
    repo: Arc<InMemoryRepository>,
    storage: MockStorageService,
    identity: MockIdentityProvider,
) -> AppState {
    AppState {
        repo,
        storage: Arc::new(storage),
        identity: Arc::new(identity),
        config: AppConfig::default(),
    }
}

// --- Tokens ---

pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub fn sign(claims: &Claims, secret: &str) -> String {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

pub fn claims_for(id: Uuid, email: &str, lifetime_secs: u64) -> Claims {
    let now = now_secs();
    Claims {
        sub: id,
        iat: now as usize,
        exp: (now + lifetime_secs) as usize,
        aud: TOKEN_AUDIENCE.to_string(),
        email: Some(email.to_string()),
        user_metadata: UserMetadata {
            full_name: Some("Ana Silva".to_string()),
            ..UserMetadata::default()
        },
    }
}

/// A valid token signed with the default test configuration's secret.
pub fn token_for(id: Uuid, email: &str) -> String {
    sign(&claims_for(id, email, 3600), &AppConfig::default().jwt_secret)
}
