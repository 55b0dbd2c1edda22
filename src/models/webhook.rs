use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Event kinds a tenant can subscribe to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WebhookEventKind {
    #[serde(rename = "property.matched")]
    PropertyMatched,
    #[serde(rename = "listing.new")]
    ListingNew,
    #[serde(rename = "listing.price_changed")]
    ListingPriceChanged,
}

impl WebhookEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PropertyMatched => "property.matched",
            Self::ListingNew => "listing.new",
            Self::ListingPriceChanged => "listing.price_changed",
        }
    }
}

impl fmt::Display for WebhookEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tenant-registered callback endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookSubscription {
    pub id: Uuid,
    pub tenant_id: String,
    pub url: String,
    pub events: BTreeSet<WebhookEventKind>,
    pub secret: String,
    pub is_active: bool,
    /// Stored for a future redelivery policy; deliveries are never retried.
    pub retry_count: u32,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl WebhookSubscription {
    pub fn accepts(&self, event: WebhookEventKind) -> bool {
        self.is_active && self.events.contains(&event)
    }
}

/// Partial update applied by `WebhookRegistry::update`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionUpdate {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub events: Option<BTreeSet<WebhookEventKind>>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Body POSTed to subscribers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookPayload {
    pub event: WebhookEventKind,
    pub timestamp: String,
    pub tenant_id: String,
    pub data: serde_json::Value,
}

/// Outcome of one delivery attempt. Not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookDelivery {
    pub subscription_id: Uuid,
    pub event: WebhookEventKind,
    pub payload: WebhookPayload,
    pub response_status: Option<u16>,
    pub response_body: String,
    pub success: bool,
    pub delivered_at: DateTime<Utc>,
}
