use serde::{Deserialize, Serialize};
use std::fmt;

use super::{PropertyData, Source};

/// How soon a buyer wants to move
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Timeline {
    Urgent,
    Flexible,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    Active,
    Paused,
    Closed,
}

/// Free-form lead metadata. Only `bedrooms` takes part in matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LeadMetadata {
    #[serde(default)]
    pub bedrooms: Option<u32>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Prospective buyer record, owned by the external lead store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lead {
    pub id: String,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub price_range: Option<String>,
    #[serde(default)]
    pub property_type: Option<String>,
    #[serde(default)]
    pub metadata: LeadMetadata,
    #[serde(default)]
    pub timeline: Option<Timeline>,
    #[serde(default)]
    pub status: LeadStatus,
}

impl Lead {
    /// City usable as a search key, if the lead has a non-blank one
    pub fn search_city(&self) -> Option<&str> {
        self.city
            .as_deref()
            .map(str::trim)
            .filter(|city| !city.is_empty())
    }

    pub fn price_bucket(&self) -> Option<PriceRange> {
        self.price_range.as_deref().and_then(PriceRange::parse)
    }
}

/// Budget buckets leads are filed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceRange {
    #[serde(rename = "300k-500k")]
    From300kTo500k,
    #[serde(rename = "500k-750k")]
    From500kTo750k,
    #[serde(rename = "750k-1M")]
    From750kTo1M,
    #[serde(rename = "1M+")]
    Over1M,
}

impl PriceRange {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "300k-500k" => Some(Self::From300kTo500k),
            "500k-750k" => Some(Self::From500kTo750k),
            "750k-1M" => Some(Self::From750kTo1M),
            "1M+" => Some(Self::Over1M),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::From300kTo500k => "300k-500k",
            Self::From500kTo750k => "500k-750k",
            Self::From750kTo1M => "750k-1M",
            Self::Over1M => "1M+",
        }
    }

    /// Inclusive bounds; `1M+` has no upper bound.
    pub fn bounds(&self) -> (u64, Option<u64>) {
        match self {
            Self::From300kTo500k => (300_000, Some(500_000)),
            Self::From500kTo750k => (500_000, Some(750_000)),
            Self::From750kTo1M => (750_000, Some(1_000_000)),
            Self::Over1M => (1_000_000, None),
        }
    }
}

impl fmt::Display for PriceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scored association between a lead and one property snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LeadMatch {
    pub lead_id: String,
    pub property_id: String,
    pub source: Source,
    pub score: f64,
    pub reasons: Vec<String>,
    pub property: PropertyData,
    pub recommendations: Vec<String>,
}
