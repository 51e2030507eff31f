use crate::catalog::FeatureSet;
use crate::models::{Listing, ListingDraft, ListingForm};

/// FormError
///
/// A field of the submitted form could not be turned into a stored value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct FormError {
    pub field: &'static str,
    pub message: String,
}

impl FormError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn required_text(field: &'static str, value: &str) -> Result<String, FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FormError::new(field, "is required"));
    }
    Ok(value.to_string())
}

/// Blank means absent. Anything else must be a non-negative whole number.
fn optional_count(field: &'static str, value: &str) -> Result<Option<i32>, FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    match value.parse::<i32>() {
        Ok(n) if n >= 0 => Ok(Some(n)),
        Ok(_) => Err(FormError::new(field, "must not be negative")),
        Err(_) => Err(FormError::new(field, format!("'{value}' is not a whole number"))),
    }
}

/// Upper bound of the `numeric(14,2)` price column.
pub const MAX_PRICE: f64 = 1e12;

/// Accepts `450000`, `450000.50` and the comma decimal separator (`450000,50`).
/// Only plain decimal notation is accepted, so `1e6`, `inf` and `NaN` are not.
fn price(value: &str) -> Result<f64, FormError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FormError::new("price", "is required"));
    }
    let normalized = value.replace(',', ".");
    let plain = normalized
        .strip_prefix('-')
        .unwrap_or(&normalized)
        .chars()
        .all(|c| c.is_ascii_digit() || c == '.');
    let parsed = normalized
        .parse::<f64>()
        .ok()
        .filter(|_| plain)
        .ok_or_else(|| FormError::new("price", format!("'{value}' is not a number")))?;
    if !parsed.is_finite() || parsed < 0.0 {
        return Err(FormError::new("price", "must be a non-negative amount"));
    }
    if parsed >= MAX_PRICE {
        return Err(FormError::new("price", "must be below 1 000 000 000 000"));
    }
    Ok(parsed)
}

impl ListingForm {
    /// Validates the form and combines it with the final image list
    /// (kept images followed by freshly uploaded ones).
    pub fn into_draft(self, images: Vec<String>) -> Result<ListingDraft, FormError> {
        let features = FeatureSet::parse(&self.features)
            .map_err(|e| FormError::new("features", e.to_string()))?;
        let description = Some(self.description.trim().to_string()).filter(|d| !d.is_empty());

        Ok(ListingDraft {
            title: required_text("title", &self.title)?,
            description,
            location: required_text("location", &self.location)?,
            price: price(&self.price)?,
            price_type: self.price_type,
            property_type: self.property_type,
            bedrooms: optional_count("bedrooms", &self.bedrooms)?,
            bathrooms: optional_count("bathrooms", &self.bathrooms)?,
            area_sqm: optional_count("area_sqm", &self.area_sqm)?,
            images,
            features,
            status: self.status,
            featured: self.featured,
        })
    }

    /// Removes `existing_images` from the form and returns the entries that
    /// are actually attached to the stored listing, in the submitted order.
    pub fn take_kept_images(&mut self, attached: &[String]) -> Vec<String> {
        std::mem::take(&mut self.existing_images)
            .into_iter()
            .filter(|url| attached.contains(url))
            .collect()
    }

    /// The form as it is pre-filled when an existing listing is opened for edit.
    pub fn from_listing(listing: &Listing) -> Self {
        let count = |n: Option<i32>| n.map(|n| n.to_string()).unwrap_or_default();
        Self {
            title: listing.title.clone(),
            description: listing.description.clone().unwrap_or_default(),
            location: listing.location.clone(),
            price: format!("{:.2}", listing.price),
            price_type: listing.price_type,
            property_type: listing.property_type,
            bedrooms: count(listing.bedrooms),
            bathrooms: count(listing.bathrooms),
            area_sqm: count(listing.area_sqm),
            features: listing.features.ids(),
            status: listing.status,
            featured: listing.featured,
            existing_images: listing.images.clone(),
        }
    }
}
