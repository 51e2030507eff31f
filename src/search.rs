//! In-process filtering and counters for the management screens. These run
//! over a set that was already fetched and scoped by the repository.

use crate::models::{Listing, ListingStats, ListingStatus, Profile, Role, RoleStats};

/// Normalizes a search term. `None` means "no filter".
fn needle(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Case-insensitive substring match on title, location or description.
pub fn listing_matches(listing: &Listing, term: &str) -> bool {
    let Some(needle) = needle(Some(term)) else {
        return true;
    };
    contains(&listing.title, &needle)
        || contains(&listing.location, &needle)
        || listing
            .description
            .as_deref()
            .is_some_and(|d| contains(d, &needle))
}

/// Case-insensitive substring match on name or email.
pub fn profile_matches(profile: &Profile, term: &str) -> bool {
    let Some(needle) = needle(Some(term)) else {
        return true;
    };
    contains(&profile.name, &needle) || contains(&profile.email, &needle)
}

/// Keeps the input order. An empty or blank term returns everything.
pub fn filter_listings(listings: Vec<Listing>, term: Option<&str>) -> Vec<Listing> {
    match needle(term) {
        None => listings,
        Some(term) => listings
            .into_iter()
            .filter(|l| listing_matches(l, &term))
            .collect(),
    }
}

pub fn filter_profiles(profiles: Vec<Profile>, term: Option<&str>) -> Vec<Profile> {
    match needle(term) {
        None => profiles,
        Some(term) => profiles
            .into_iter()
            .filter(|p| profile_matches(p, &term))
            .collect(),
    }
}

pub fn listing_stats(listings: &[Listing]) -> ListingStats {
    ListingStats {
        total: listings.len(),
        available: listings
            .iter()
            .filter(|l| l.status == ListingStatus::Available)
            .count(),
        sold: listings
            .iter()
            .filter(|l| l.status == ListingStatus::Sold)
            .count(),
        featured: listings.iter().filter(|l| l.featured).count(),
    }
}

pub fn role_stats(profiles: &[Profile]) -> RoleStats {
    let count = |pred: fn(Role) -> bool| profiles.iter().filter(|p| pred(p.role)).count();
    RoleStats {
        total: profiles.len(),
        privileged: count(|r| matches!(r, Role::Admin | Role::Configurator)),
        sellers: count(|r| r == Role::Seller),
        users: count(|r| r == Role::User),
    }
}
