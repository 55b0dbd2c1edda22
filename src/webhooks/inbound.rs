use crate::leads::{LeadResolver, StoreError};
use crate::matching::{MatchError, MatchingEngine};
use crate::models::{Lead, PropertyData, Source, WebhookEventKind};
use crate::webhooks::dispatcher::WebhookDispatcher;
use crate::webhooks::signing::verify_signature;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum InboundError {
    #[error("malformed payload: {0}")]
    Malformed(String),
    #[error("missing signature for provider {0}")]
    MissingSignature(String),
    #[error("signature mismatch for provider {0}")]
    SignatureMismatch(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Price movement reported by a provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceChange {
    pub property_id: String,
    #[serde(default)]
    pub source: Option<Source>,
    pub old_price: u64,
    pub new_price: u64,
}

impl PriceChange {
    /// Signed price movement, `None` when it does not fit an `i64`
    pub fn delta(&self) -> Option<i64> {
        i64::try_from(i128::from(self.new_price) - i128::from(self.old_price)).ok()
    }
}

/// Provider push event, validated at the boundary
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    NewListing(PropertyData),
    PriceChange(PriceChange),
    Unknown(String),
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl InboundEvent {
    pub fn parse(body: &[u8]) -> Result<Self, InboundError> {
        let envelope: Envelope =
            serde_json::from_slice(body).map_err(|err| InboundError::Malformed(err.to_string()))?;

        match envelope.kind.as_str() {
            "new_listing" => serde_json::from_value(envelope.data)
                .map(InboundEvent::NewListing)
                .map_err(|err| InboundError::Malformed(format!("new_listing: {err}"))),
            "price_change" => {
                let change: PriceChange = serde_json::from_value(envelope.data)
                    .map_err(|err| InboundError::Malformed(format!("price_change: {err}")))?;
                if change.delta().is_none() {
                    return Err(InboundError::Malformed(format!(
                        "price_change: delta between {} and {} is out of range",
                        change.old_price, change.new_price
                    )));
                }
                Ok(InboundEvent::PriceChange(change))
            }
            _ => Ok(InboundEvent::Unknown(envelope.kind)),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InboundOutcome {
    Processed {
        event: String,
        leads_resolved: usize,
        notifications_sent: usize,
    },
    Ignored {
        event: String,
    },
}

/// Applies provider push events to matches and tenant notifications
#[derive(Clone)]
pub struct InboundWebhookHandler {
    resolver: Arc<dyn LeadResolver>,
    engine: MatchingEngine,
    dispatcher: WebhookDispatcher,
    provider_secrets: HashMap<String, String>,
}

impl InboundWebhookHandler {
    pub fn new(
        resolver: Arc<dyn LeadResolver>,
        engine: MatchingEngine,
        dispatcher: WebhookDispatcher,
    ) -> Self {
        Self {
            resolver,
            engine,
            dispatcher,
            provider_secrets: HashMap::new(),
        }
    }

    /// Require signed payloads from the given providers.
    ///
    /// Providers without a secret are accepted unsigned.
    pub fn with_provider_secrets(mut self, secrets: HashMap<String, String>) -> Self {
        self.provider_secrets = secrets
            .into_iter()
            .map(|(provider, secret)| (provider.to_ascii_lowercase(), secret))
            .collect();
        self
    }

    fn authenticate(
        &self,
        provider_id: &str,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<(), InboundError> {
        let Some(secret) = self.provider_secrets.get(&provider_id.to_ascii_lowercase()) else {
            return Ok(());
        };
        let signature =
            signature.ok_or_else(|| InboundError::MissingSignature(provider_id.to_string()))?;
        let body = std::str::from_utf8(body)
            .map_err(|err| InboundError::Malformed(err.to_string()))?;
        if verify_signature(body, signature, secret) {
            Ok(())
        } else {
            Err(InboundError::SignatureMismatch(provider_id.to_string()))
        }
    }

    pub async fn handle(
        &self,
        provider_id: &str,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<InboundOutcome, InboundError> {
        self.authenticate(provider_id, body, signature)?;

        let provider = Source::parse(provider_id);
        match InboundEvent::parse(body)? {
            InboundEvent::NewListing(mut property) => {
                property.source = provider.ok_or_else(|| {
                    InboundError::Malformed(format!("unknown listing provider '{provider_id}'"))
                })?;
                self.on_new_listing(provider_id, property).await
            }
            InboundEvent::PriceChange(mut change) => {
                change.source = provider.or(change.source);
                self.on_price_change(provider_id, change).await
            }
            InboundEvent::Unknown(kind) => {
                info!("Ignoring '{}' event from {}", kind, provider_id);
                Ok(InboundOutcome::Ignored { event: kind })
            }
        }
    }

    /// Matches the pushed listing on its own, so the lead's stored set for
    /// that source is replaced by the result, as a scheduled tick would.
    async fn on_new_listing(
        &self,
        provider_id: &str,
        property: PropertyData,
    ) -> Result<InboundOutcome, InboundError> {
        let leads = self.resolver.leads_for_listing(&property).await?;
        info!(
            "New listing {} from {} affects {} leads",
            property.id,
            provider_id,
            leads.len()
        );

        let mut notifications_sent = 0;
        for lead in &leads {
            let matches = match self
                .engine
                .process_property_matches(&lead.id, std::slice::from_ref(&property), property.source)
                .await
            {
                Ok(matches) => matches,
                Err(MatchError::LeadNotFound(id)) => {
                    debug!("Lead {} disappeared before matching", id);
                    continue;
                }
                Err(err) => {
                    warn!("Matching lead {} against {} failed: {}", lead.id, property.id, err);
                    continue;
                }
            };

            let data = json!({
                "lead_id": lead.id,
                "property": property,
                "matches": matches,
            });
            notifications_sent += self.notify(lead, WebhookEventKind::ListingNew, data).await;
        }

        Ok(InboundOutcome::Processed {
            event: "new_listing".to_string(),
            leads_resolved: leads.len(),
            notifications_sent,
        })
    }

    async fn on_price_change(
        &self,
        provider_id: &str,
        change: PriceChange,
    ) -> Result<InboundOutcome, InboundError> {
        let delta = change.delta().ok_or_else(|| {
            InboundError::Malformed(format!("price delta out of range for {}", change.property_id))
        })?;
        let leads = self
            .resolver
            .leads_matched_to(change.source, &change.property_id)
            .await?;
        info!(
            "Price change on {} from {} ({:+}) affects {} leads",
            change.property_id,
            provider_id,
            delta,
            leads.len()
        );

        let mut notifications_sent = 0;
        for lead in &leads {
            let data = json!({
                "lead_id": lead.id,
                "property_id": change.property_id,
                "old_price": change.old_price,
                "new_price": change.new_price,
                "delta": delta,
            });
            notifications_sent += self
                .notify(lead, WebhookEventKind::ListingPriceChanged, data)
                .await;
        }

        Ok(InboundOutcome::Processed {
            event: "price_change".to_string(),
            leads_resolved: leads.len(),
            notifications_sent,
        })
    }

    /// Number of successful deliveries for the lead's tenant
    async fn notify(&self, lead: &Lead, event: WebhookEventKind, data: Value) -> usize {
        let Some(tenant_id) = lead.tenant_id.as_deref() else {
            debug!("Lead {} has no tenant, skipping {}", lead.id, event);
            return 0;
        };
        match self.dispatcher.dispatch(event, data, tenant_id).await {
            Ok(deliveries) => deliveries.iter().filter(|d| d.success).count(),
            Err(err) => {
                warn!("Could not notify tenant {}: {}", tenant_id, err);
                0
            }
        }
    }
}
