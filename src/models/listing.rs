//! Listing record data structure.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Derive the stable identifier of a listing from its canonical link.
///
/// SHA-256 over the UTF-8 bytes of the link, lowercase hex encoded.
pub fn listing_id(link: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(link.as_bytes());
    hex::encode(hasher.finalize())
}

/// Where a listing is located, as shown on its card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub neighborhood: String,
}

impl Location {
    pub fn new(city: impl Into<String>, neighborhood: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            neighborhood: neighborhood.into(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.city, self.neighborhood)
    }
}

/// A listing extracted from the source page.
///
/// Records are plain values: construct once, never mutate. Identity for
/// deduplication is decided outside the type (see `pipeline::dedup::key_of`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    /// Hex digest of `link`
    pub id: String,

    /// Canonical absolute URL of the listing
    pub link: String,

    /// Card heading (empty when absent)
    pub title: String,

    /// Price text (empty when absent)
    pub price: String,

    /// Specs line (empty when absent)
    pub specs: String,

    /// Short description (empty when absent)
    pub description: String,

    /// Display form of the location, `"{city} {neighborhood}"`
    pub location: String,
}

impl ListingRecord {
    pub fn new(
        link: impl Into<String>,
        title: impl Into<String>,
        price: impl Into<String>,
        specs: impl Into<String>,
        description: impl Into<String>,
        location: &Location,
    ) -> Self {
        let link = link.into();
        Self {
            id: listing_id(&link),
            link,
            title: title.into(),
            price: price.into(),
            specs: specs.into(),
            description: description.into(),
            location: location.to_string(),
        }
    }
}

impl fmt::Display for ListingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Link: {}\nTitle: {}\nPrice: {}\nSpecs: {}\nDescription: {}\nLocation: {}",
            self.link, self.title, self.price, self.specs, self.description, self.location
        )
    }
}
