use crate::models::{WebhookDelivery, WebhookEventKind, WebhookPayload, WebhookSubscription};
use crate::webhooks::registry::{RegistryError, WebhookRegistry};
use crate::webhooks::signing::sign_payload;
use chrono::{SecondsFormat, Utc};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const EVENT_HEADER: &str = "X-Webhook-Event";
pub const TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";

/// Response bodies are kept for diagnostics only, so they are cut short.
pub const MAX_RESPONSE_BODY_CHARS: usize = 1000;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub timeout: Duration,
    pub max_concurrent_deliveries: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_concurrent_deliveries: 50,
        }
    }
}

/// Signs events and fans them out to a tenant's subscribers.
///
/// Delivery is best-effort and at-most-once: each subscriber gets a single
/// attempt, failures are reported in the returned `WebhookDelivery` values
/// and nothing is redelivered.
#[derive(Clone)]
pub struct WebhookDispatcher {
    registry: WebhookRegistry,
    client: Client,
    config: DispatcherConfig,
}

impl WebhookDispatcher {
    pub fn new(registry: WebhookRegistry, config: DispatcherConfig) -> Self {
        Self {
            registry,
            client: Client::new(),
            config,
        }
    }

    /// Deliver `event` to every active subscriber of the tenant.
    ///
    /// Returns once every attempt has finished. Without matching
    /// subscribers no payload is built and the result is empty.
    pub async fn dispatch(
        &self,
        event: WebhookEventKind,
        data: serde_json::Value,
        tenant_id: &str,
    ) -> Result<Vec<WebhookDelivery>, RegistryError> {
        let subscriptions = self.registry.active_for(tenant_id, event).await?;
        if subscriptions.is_empty() {
            debug!("No subscribers for {} in tenant {}", event, tenant_id);
            return Ok(Vec::new());
        }

        let payload = WebhookPayload {
            event,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            tenant_id: tenant_id.to_string(),
            data,
        };

        let deliveries: Vec<WebhookDelivery> = stream::iter(subscriptions.clone())
            .map(|subscription| {
                let dispatcher = self.clone();
                let payload = payload.clone();
                async move { dispatcher.deliver(&subscription, &payload).await }
            })
            .buffer_unordered(self.config.max_concurrent_deliveries.max(1))
            .collect()
            .await;

        let attempted_at = Utc::now();
        for subscription in &subscriptions {
            if let Err(err) = self
                .registry
                .mark_triggered(tenant_id, subscription.id, attempted_at)
                .await
            {
                warn!("Could not record trigger time for {}: {}", subscription.id, err);
            }
        }

        let succeeded = deliveries.iter().filter(|d| d.success).count();
        info!(
            "Dispatched {} to {}/{} subscribers of tenant {}",
            event,
            succeeded,
            deliveries.len(),
            tenant_id
        );

        Ok(deliveries)
    }

    async fn deliver(
        &self,
        subscription: &WebhookSubscription,
        payload: &WebhookPayload,
    ) -> WebhookDelivery {
        let failed = |body: String| WebhookDelivery {
            subscription_id: subscription.id,
            event: payload.event,
            payload: payload.clone(),
            response_status: None,
            response_body: truncate_chars(&body, MAX_RESPONSE_BODY_CHARS),
            success: false,
            delivered_at: Utc::now(),
        };

        let body = match serde_json::to_string(payload) {
            Ok(body) => body,
            Err(err) => return failed(format!("serialization failed: {err}")),
        };
        let signature = match sign_payload(&body, &subscription.secret) {
            Ok(signature) => signature,
            Err(err) => return failed(err.to_string()),
        };

        let response = self
            .client
            .post(&subscription.url)
            .timeout(self.config.timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .header(EVENT_HEADER, payload.event.as_str())
            .header(TIMESTAMP_HEADER, &payload.timestamp)
            .body(body)
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                if !status.is_success() {
                    warn!(
                        "Webhook {} to {} answered {}",
                        subscription.id, subscription.url, status
                    );
                }
                WebhookDelivery {
                    subscription_id: subscription.id,
                    event: payload.event,
                    payload: payload.clone(),
                    response_status: Some(status.as_u16()),
                    response_body: truncate_chars(&text, MAX_RESPONSE_BODY_CHARS),
                    success: status.is_success(),
                    delivered_at: Utc::now(),
                }
            }
            Err(err) => {
                warn!(
                    "Webhook {} to {} failed: {}",
                    subscription.id, subscription.url, err
                );
                failed(err.to_string())
            }
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}
