use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod lead;
pub mod webhook;

pub use lead::{Lead, LeadMatch, LeadMetadata, LeadStatus, PriceRange, Timeline};
pub use webhook::{
    WebhookDelivery, WebhookEventKind, WebhookPayload, WebhookSubscription, SubscriptionUpdate,
};

/// Provider the property listing was pulled from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Zillow,
    Realtor,
    Mls,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Zillow, Source::Realtor, Source::Mls];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Zillow => "zillow",
            Source::Realtor => "realtor",
            Source::Mls => "mls",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "zillow" => Some(Source::Zillow),
            "realtor" | "realtor.com" => Some(Source::Realtor),
            "mls" => Some(Source::Mls),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Market status of a listing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    #[default]
    Active,
    Pending,
    Sold,
    OffMarket,
}

/// Location information for a property
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Location {
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Listing agent contact, when the provider exposes one
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub brokerage: Option<String>,
}

/// Normalized listing snapshot from one provider.
///
/// Snapshots are never mutated; a re-fetch produces a new value that
/// supersedes the previous one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertyData {
    pub id: String,
    pub source: Source,
    pub address: String,
    pub location: Location,
    pub price: u64,
    #[serde(default)]
    pub beds: u32,
    #[serde(default)]
    pub baths: f32,
    #[serde(default)]
    pub sqft: u32,
    #[serde(default)]
    pub lot_size: Option<u32>,
    #[serde(default)]
    pub year_built: Option<u16>,
    pub property_type: String,
    #[serde(default)]
    pub listing_status: ListingStatus,
    #[serde(default)]
    pub days_on_market: u32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub agent: Option<Agent>,
    pub last_updated: DateTime<Utc>,
}

impl PropertyData {
    pub fn city(&self) -> &str {
        &self.location.city
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn property(id: &str, city: &str, price: u64, property_type: &str) -> PropertyData {
        PropertyData {
            id: id.to_string(),
            source: Source::Zillow,
            address: format!("{} Main St", id),
            location: Location {
                city: city.to_string(),
                state: "ON".to_string(),
                zip: "M5V 2T6".to_string(),
                latitude: None,
                longitude: None,
            },
            price,
            beds: 2,
            baths: 1.5,
            sqft: 900,
            lot_size: None,
            year_built: Some(2012),
            property_type: property_type.to_string(),
            listing_status: ListingStatus::Active,
            days_on_market: 45,
            description: String::new(),
            images: vec![],
            features: vec![],
            agent: None,
            last_updated: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_parses_provider_aliases() {
        assert_eq!(Source::parse("Zillow"), Some(Source::Zillow));
        assert_eq!(Source::parse("realtor.com"), Some(Source::Realtor));
        assert_eq!(Source::parse(" MLS "), Some(Source::Mls));
        assert_eq!(Source::parse("redfin"), None);
    }

    #[test]
    fn property_deserializes_with_optional_fields_missing() {
        let json = serde_json::json!({
            "id": "z-1",
            "source": "zillow",
            "address": "1 King St",
            "location": { "city": "Toronto" },
            "price": 625000,
            "property_type": "Condo",
            "listing_status": "off_market",
            "last_updated": "2026-03-01T12:00:00Z"
        });

        let property: PropertyData = serde_json::from_value(json).unwrap();
        assert_eq!(property.city(), "Toronto");
        assert_eq!(property.listing_status, ListingStatus::OffMarket);
        assert_eq!(property.days_on_market, 0);
        assert!(property.agent.is_none());
    }
}
