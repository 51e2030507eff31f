use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::catalog::{Feature, FeatureSet};
use crate::pagination::Page;

/// Raised when a text column or request field holds a value outside one of the
/// closed enumerations below.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} '{value}'")]
pub struct InvalidVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Implements `as_str`, `Display`, `FromStr` and `TryFrom<String>` for a
/// text-backed enum so it can round-trip through Postgres `text` columns.
macro_rules! text_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = InvalidVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(InvalidVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl TryFrom<String> for $ty {
            type Error = InvalidVariant;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

// --- Roles & Capabilities ---

/// Role
///
/// Four-tier privilege ladder. Declaration order is privilege order, so the
/// derived `Ord` gives `User < Seller < Admin < Configurator`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    Seller,
    Admin,
    Configurator,
}

text_enum!(Role, "role", {
    User => "user",
    Seller => "seller",
    Admin => "admin",
    Configurator => "configurator",
});

impl Role {
    pub const ALL: [Role; 4] = [Role::User, Role::Seller, Role::Admin, Role::Configurator];

    /// Whether an actor holding `self` may move a profile from `current` to
    /// `requested`. The error is the reason reported with the 403.
    pub fn may_assign(self, current: Role, requested: Role) -> Result<(), &'static str> {
        if self < Role::Admin {
            return Err("role management requires admin");
        }
        if requested == Role::Configurator && self != Role::Configurator {
            return Err("only a configurator may grant configurator");
        }
        if current == Role::Configurator && self != Role::Configurator {
            return Err("only a configurator may change a configurator");
        }
        Ok(())
    }
}

/// Capabilities
///
/// Derived booleans consumed by clients to gate what they render. These are a
/// UX convenience; the repository and the role-assignment rules are where
/// permissions are actually enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Capabilities {
    pub is_admin: bool,
    pub is_seller: bool,
    pub is_configurator: bool,
}

impl Capabilities {
    pub fn for_role(role: Role) -> Self {
        Self {
            is_admin: matches!(role, Role::Admin | Role::Configurator),
            is_seller: matches!(role, Role::Seller | Role::Admin | Role::Configurator),
            is_configurator: role == Role::Configurator,
        }
    }

    /// No session: every flag off.
    pub fn anonymous() -> Self {
        Self::default()
    }
}

// --- Profiles ---

/// Profile
///
/// Row of `public.profiles`, the 1:1 mirror of an auth identity carrying the
/// application role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Profile {
    // Same value as the auth identity id.
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities::for_role(self.role)
    }
}

/// NewProfile
///
/// Insert payload used by the session resolver on first login.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProfile {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub avatar_url: Option<String>,
    pub role: Role,
}

/// RoleStats
///
/// Head counts shown above the user directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RoleStats {
    pub total: usize,
    /// Admins and configurators together.
    pub privileged: usize,
    pub sellers: usize,
    pub users: usize,
}

// --- Listings ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PriceType {
    #[default]
    Sale,
    Rent,
}

text_enum!(PriceType, "price_type", {
    Sale => "sale",
    Rent => "rent",
});

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum PropertyType {
    #[default]
    Apartment,
    House,
    Land,
    Commercial,
}

text_enum!(PropertyType, "property_type", {
    Apartment => "apartment",
    House => "house",
    Land => "land",
    Commercial => "commercial",
});

/// ListingStatus
///
/// Only `Available` listings are visible on public pages. Moving a listing to
/// any other status is the soft-delete path.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum ListingStatus {
    #[default]
    Available,
    Pending,
    Sold,
    Rented,
}

text_enum!(ListingStatus, "status", {
    Available => "available",
    Pending => "pending",
    Sold => "sold",
    Rented => "rented",
});

/// Listing
///
/// Row of `public.listings`. `price` is stored as `numeric(14,2)` and read back
/// through a `float8` cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[ts(export)]
pub struct Listing {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub price: f64,
    #[sqlx(try_from = "String")]
    pub price_type: PriceType,
    #[sqlx(try_from = "String")]
    pub property_type: PropertyType,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub area_sqm: Option<i32>,
    /// Public URLs in display order; the first one is the cover.
    pub images: Vec<String>,
    #[sqlx(try_from = "Vec<String>")]
    #[ts(as = "Vec<Feature>")]
    #[schema(value_type = Vec<Feature>)]
    pub features: FeatureSet,
    #[sqlx(try_from = "String")]
    pub status: ListingStatus,
    pub featured: bool,
    pub created_by: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// ListingDraft
///
/// A validated listing payload, produced from a `ListingForm` once numeric
/// fields are parsed and uploads have been resolved to URLs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListingDraft {
    pub title: String,
    pub description: Option<String>,
    pub location: String,
    pub price: f64,
    pub price_type: PriceType,
    pub property_type: PropertyType,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub area_sqm: Option<i32>,
    pub images: Vec<String>,
    pub features: FeatureSet,
    pub status: ListingStatus,
    pub featured: bool,
}

/// ListingStats
///
/// Counters over the management view's fetched set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ListingStats {
    pub total: usize,
    pub available: usize,
    pub sold: usize,
    pub featured: usize,
}

// --- Request Payloads ---

/// ListingForm
///
/// The editable form as a client submits it: numeric fields arrive as text
/// exactly as typed, features as catalogue ids. Sent as the `listing` part of
/// the multipart create/update request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ListingForm {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub location: String,
    #[schema(example = "450000")]
    pub price: String,
    #[serde(default)]
    pub price_type: PriceType,
    #[serde(default)]
    pub property_type: PropertyType,
    #[serde(default)]
    pub bedrooms: String,
    #[serde(default)]
    pub bathrooms: String,
    #[serde(default)]
    pub area_sqm: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub status: ListingStatus,
    #[serde(default)]
    pub featured: bool,
    /// Images already attached to the listing that should be kept, in order.
    /// New uploads are appended after these.
    #[serde(default)]
    pub existing_images: Vec<String>,
}

/// UpdateRoleRequest
///
/// Body of `PUT /admin/users/{id}/role`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateRoleRequest {
    pub role: Role,
}

/// UpdateStatusRequest
///
/// Body of `PATCH /manage/listings/{id}/status`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct UpdateStatusRequest {
    pub status: ListingStatus,
}

// --- Response Schemas ---

/// SessionResponse
///
/// The resolved session as seen by a client. `degraded` is set when the
/// profile could not be loaded or created and a default-role view was
/// synthesized instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionResponse {
    pub profile: Option<Profile>,
    #[serde(flatten)]
    pub capabilities: Capabilities,
    pub degraded: bool,
}

impl SessionResponse {
    pub fn anonymous() -> Self {
        Self {
            profile: None,
            capabilities: Capabilities::anonymous(),
            degraded: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ManagedListings {
    pub page: Page<Listing>,
    pub stats: ListingStats,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserDirectory {
    pub page: Page<Profile>,
    pub stats: RoleStats,
}

/// PublicConfig
///
/// Values a browser client needs to talk to the hosted platform directly,
/// plus the names of any that are missing so it can show a broken state.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct PublicConfig {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub google_client_id: Option<String>,
    pub missing: Vec<String>,
}
