use crate::{
    error::RepoError,
    models::{Listing, ListingDraft, ListingStatus, NewProfile, Profile, Role},
    pagination::{Page, PageRequest},
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use std::sync::Arc;
use uuid::Uuid;

/// ListingScope
///
/// Which listings a management operation may touch. Sellers get `OwnedBy`,
/// admins and configurators get `All`. Every management query and write is
/// filtered by the scope in SQL, so a seller cannot reach another seller's
/// row even by guessing its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingScope {
    All,
    OwnedBy(Uuid),
}

/// Repository Trait
///
/// The persistence contract for profiles and listings. Handlers and the
/// session resolver only see this trait, so tests swap in an in-memory
/// implementation.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Profiles ---
    /// `Ok(None)` when no profile row exists for the id.
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, RepoError>;
    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, RepoError>;
    /// Every profile, newest first.
    async fn list_profiles(&self) -> Result<Vec<Profile>, RepoError>;
    /// `Ok(None)` when the target profile does not exist.
    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<Profile>, RepoError>;

    // --- Public Listings ---
    /// Available listings only, newest first, with the exact total count.
    async fn list_public_listings(&self, page: PageRequest) -> Result<Page<Listing>, RepoError>;
    async fn get_public_listing(&self, id: Uuid) -> Result<Option<Listing>, RepoError>;
    async fn list_featured_listings(&self, limit: i64) -> Result<Vec<Listing>, RepoError>;

    // --- Managed Listings ---
    /// Every listing in scope, newest first, optionally narrowed by status.
    async fn list_managed_listings(
        &self,
        scope: ListingScope,
        status: Option<ListingStatus>,
    ) -> Result<Vec<Listing>, RepoError>;
    async fn get_managed_listing(
        &self,
        id: Uuid,
        scope: ListingScope,
    ) -> Result<Option<Listing>, RepoError>;
    async fn create_listing(
        &self,
        draft: ListingDraft,
        created_by: Uuid,
    ) -> Result<Listing, RepoError>;
    /// `Ok(None)` when the listing does not exist or is outside the scope.
    async fn update_listing(
        &self,
        id: Uuid,
        scope: ListingScope,
        draft: ListingDraft,
    ) -> Result<Option<Listing>, RepoError>;
    async fn set_listing_status(
        &self,
        id: Uuid,
        scope: ListingScope,
        status: ListingStatus,
    ) -> Result<Option<Listing>, RepoError>;
    /// `Ok(false)` when nothing in scope matched.
    async fn delete_listing(&self, id: Uuid, scope: ListingScope) -> Result<bool, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const PROFILE_COLUMNS: &str = "id, email, name, avatar_url, role, created_at";

// `price` is numeric(14,2) in the schema; cast so it decodes into f64.
const LISTING_COLUMNS: &str = "id, title, description, location, price::float8 AS price, \
     price_type, property_type, bedrooms, bathrooms, area_sqm, images, features, \
     status, featured, created_by, created_at";

/// Appends ` AND created_by = $n` for owner-scoped operations.
fn push_scope(builder: &mut QueryBuilder<'_, Postgres>, scope: ListingScope) {
    if let ListingScope::OwnedBy(owner) = scope {
        builder.push(" AND created_by = ");
        builder.push_bind(owner);
    }
}

/// PostgresRepository
///
/// `Repository` backed by the hosted Postgres instance. Queries are built at
/// runtime so the crate compiles without a live database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, RepoError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1");
        let profile = sqlx::query_as::<_, Profile>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    /// create_profile
    ///
    /// `ON CONFLICT DO NOTHING` plus a re-read makes two concurrent first
    /// logins for the same identity converge on one row.
    async fn create_profile(&self, profile: NewProfile) -> Result<Profile, RepoError> {
        let sql = format!(
            "INSERT INTO profiles (id, email, name, avatar_url, role) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO NOTHING \
             RETURNING {PROFILE_COLUMNS}"
        );
        let inserted = sqlx::query_as::<_, Profile>(&sql)
            .bind(profile.id)
            .bind(&profile.email)
            .bind(&profile.name)
            .bind(&profile.avatar_url)
            .bind(profile.role.as_str())
            .fetch_optional(&self.pool)
            .await?;

        match inserted {
            Some(p) => Ok(p),
            None => self
                .get_profile(profile.id)
                .await?
                .ok_or_else(|| RepoError::Unavailable("profile vanished after insert".into())),
        }
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, RepoError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at DESC");
        let profiles = sqlx::query_as::<_, Profile>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(profiles)
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<Option<Profile>, RepoError> {
        let sql = format!("UPDATE profiles SET role = $2 WHERE id = $1 RETURNING {PROFILE_COLUMNS}");
        let profile = sqlx::query_as::<_, Profile>(&sql)
            .bind(id)
            .bind(role.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    /// list_public_listings
    ///
    /// **Security**: `status = 'available'` is part of the base query and of the count.
    async fn list_public_listings(&self, page: PageRequest) -> Result<Page<Listing>, RepoError> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM listings WHERE status = 'available'")
                .fetch_one(&self.pool)
                .await?;

        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM listings WHERE status = 'available' \
             ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2"
        );
        let items = sqlx::query_as::<_, Listing>(&sql)
            .bind(page.limit() as i64)
            .bind(page.offset() as i64)
            .fetch_all(&self.pool)
            .await?;

        Ok(Page::new(items, total.max(0) as u64, page))
    }

    async fn get_public_listing(&self, id: Uuid) -> Result<Option<Listing>, RepoError> {
        let sql =
            format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = $1 AND status = 'available'");
        let listing = sqlx::query_as::<_, Listing>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(listing)
    }

    async fn list_featured_listings(&self, limit: i64) -> Result<Vec<Listing>, RepoError> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM listings \
             WHERE status = 'available' AND featured = true \
             ORDER BY created_at DESC LIMIT $1"
        );
        let listings = sqlx::query_as::<_, Listing>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(listings)
    }

    async fn list_managed_listings(
        &self,
        scope: ListingScope,
        status: Option<ListingStatus>,
    ) -> Result<Vec<Listing>, RepoError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {LISTING_COLUMNS} FROM listings WHERE true"));
        push_scope(&mut builder, scope);
        if let Some(status) = status {
            builder.push(" AND status = ");
            builder.push_bind(status.as_str());
        }
        builder.push(" ORDER BY created_at DESC, id DESC");

        let listings = builder
            .build_query_as::<Listing>()
            .fetch_all(&self.pool)
            .await?;
        Ok(listings)
    }

    async fn get_managed_listing(
        &self,
        id: Uuid,
        scope: ListingScope,
    ) -> Result<Option<Listing>, RepoError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = "));
        builder.push_bind(id);
        push_scope(&mut builder, scope);

        let listing = builder
            .build_query_as::<Listing>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(listing)
    }

    async fn create_listing(
        &self,
        draft: ListingDraft,
        created_by: Uuid,
    ) -> Result<Listing, RepoError> {
        let sql = format!(
            "INSERT INTO listings \
             (id, title, description, location, price, price_type, property_type, \
              bedrooms, bathrooms, area_sqm, images, features, status, featured, created_by) \
             VALUES ($1, $2, $3, $4, $5::float8::numeric, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             RETURNING {LISTING_COLUMNS}"
        );
        let listing = sqlx::query_as::<_, Listing>(&sql)
            .bind(Uuid::new_v4())
            .bind(&draft.title)
            .bind(&draft.description)
            .bind(&draft.location)
            .bind(draft.price)
            .bind(draft.price_type.as_str())
            .bind(draft.property_type.as_str())
            .bind(draft.bedrooms)
            .bind(draft.bathrooms)
            .bind(draft.area_sqm)
            .bind(&draft.images)
            .bind(draft.features.ids())
            .bind(draft.status.as_str())
            .bind(draft.featured)
            .bind(created_by)
            .fetch_one(&self.pool)
            .await?;
        Ok(listing)
    }

    /// update_listing
    ///
    /// Full replacement of the editable columns. `created_by` and
    /// `created_at` are never rewritten, so an admin editing a seller's
    /// listing does not take ownership of it.
    async fn update_listing(
        &self,
        id: Uuid,
        scope: ListingScope,
        draft: ListingDraft,
    ) -> Result<Option<Listing>, RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE listings SET title = ");
        builder.push_bind(draft.title);
        builder.push(", description = ");
        builder.push_bind(draft.description);
        builder.push(", location = ");
        builder.push_bind(draft.location);
        builder.push(", price = ");
        builder.push_bind(draft.price);
        builder.push("::float8::numeric, price_type = ");
        builder.push_bind(draft.price_type.as_str());
        builder.push(", property_type = ");
        builder.push_bind(draft.property_type.as_str());
        builder.push(", bedrooms = ");
        builder.push_bind(draft.bedrooms);
        builder.push(", bathrooms = ");
        builder.push_bind(draft.bathrooms);
        builder.push(", area_sqm = ");
        builder.push_bind(draft.area_sqm);
        builder.push(", images = ");
        builder.push_bind(draft.images);
        builder.push(", features = ");
        builder.push_bind(draft.features.ids());
        builder.push(", status = ");
        builder.push_bind(draft.status.as_str());
        builder.push(", featured = ");
        builder.push_bind(draft.featured);
        builder.push(" WHERE id = ");
        builder.push_bind(id);
        push_scope(&mut builder, scope);
        builder.push(format!(" RETURNING {LISTING_COLUMNS}"));

        let listing = builder
            .build_query_as::<Listing>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(listing)
    }

    async fn set_listing_status(
        &self,
        id: Uuid,
        scope: ListingScope,
        status: ListingStatus,
    ) -> Result<Option<Listing>, RepoError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("UPDATE listings SET status = ");
        builder.push_bind(status.as_str());
        builder.push(" WHERE id = ");
        builder.push_bind(id);
        push_scope(&mut builder, scope);
        builder.push(format!(" RETURNING {LISTING_COLUMNS}"));

        let listing = builder
            .build_query_as::<Listing>()
            .fetch_optional(&self.pool)
            .await?;
        Ok(listing)
    }

    async fn delete_listing(&self, id: Uuid, scope: ListingScope) -> Result<bool, RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("DELETE FROM listings WHERE id = ");
        builder.push_bind(id);
        push_scope(&mut builder, scope);

        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
