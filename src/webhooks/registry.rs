use crate::leads::StoreError;
use crate::models::{SubscriptionUpdate, WebhookEventKind, WebhookSubscription};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::RngCore;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::info;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid webhook url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("a subscription needs at least one event")]
    NoEvents,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Backing storage for subscriptions, partitioned by tenant
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn insert(&self, subscription: WebhookSubscription) -> Result<(), StoreError>;

    async fn list(&self, tenant_id: &str) -> Result<Vec<WebhookSubscription>, StoreError>;

    /// Replace the stored subscription with the same tenant and id
    async fn replace(&self, subscription: WebhookSubscription) -> Result<bool, StoreError>;

    async fn remove(&self, tenant_id: &str, id: Uuid) -> Result<bool, StoreError>;
}

/// Process-local store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemorySubscriptionStore {
    tenants: RwLock<HashMap<String, Vec<WebhookSubscription>>>,
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn insert(&self, subscription: WebhookSubscription) -> Result<(), StoreError> {
        let mut tenants = self.tenants.write().map_err(|_| StoreError::poisoned())?;
        tenants
            .entry(subscription.tenant_id.clone())
            .or_default()
            .push(subscription);
        Ok(())
    }

    async fn list(&self, tenant_id: &str) -> Result<Vec<WebhookSubscription>, StoreError> {
        let tenants = self.tenants.read().map_err(|_| StoreError::poisoned())?;
        Ok(tenants.get(tenant_id).cloned().unwrap_or_default())
    }

    async fn replace(&self, subscription: WebhookSubscription) -> Result<bool, StoreError> {
        let mut tenants = self.tenants.write().map_err(|_| StoreError::poisoned())?;
        let slot = tenants
            .get_mut(&subscription.tenant_id)
            .and_then(|subs| subs.iter_mut().find(|s| s.id == subscription.id));
        match slot {
            Some(existing) => {
                *existing = subscription;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, tenant_id: &str, id: Uuid) -> Result<bool, StoreError> {
        let mut tenants = self.tenants.write().map_err(|_| StoreError::poisoned())?;
        let Some(subs) = tenants.get_mut(tenant_id) else {
            return Ok(false);
        };
        let before = subs.len();
        subs.retain(|s| s.id != id);
        Ok(subs.len() != before)
    }
}

fn validate_url(raw: &str) -> Result<(), RegistryError> {
    let invalid = |reason: &str| RegistryError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };
    let url = Url::parse(raw).map_err(|err| invalid(&err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(())
}

/// 32 random bytes, hex encoded
pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Tenant-scoped webhook subscription management
#[derive(Clone)]
pub struct WebhookRegistry {
    store: Arc<dyn SubscriptionStore>,
}

impl WebhookRegistry {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemorySubscriptionStore::default()))
    }

    pub async fn subscribe(
        &self,
        tenant_id: &str,
        url: &str,
        events: impl IntoIterator<Item = WebhookEventKind>,
        secret: Option<String>,
    ) -> Result<WebhookSubscription, RegistryError> {
        validate_url(url)?;
        let events: BTreeSet<WebhookEventKind> = events.into_iter().collect();
        if events.is_empty() {
            return Err(RegistryError::NoEvents);
        }

        let subscription = WebhookSubscription {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            url: url.to_string(),
            events,
            secret: secret
                .filter(|secret| !secret.is_empty())
                .unwrap_or_else(generate_secret),
            is_active: true,
            retry_count: 0,
            last_triggered_at: None,
            created_at: Utc::now(),
        };
        self.store.insert(subscription.clone()).await?;

        info!(
            "Registered webhook {} for tenant {} -> {}",
            subscription.id, tenant_id, subscription.url
        );
        Ok(subscription)
    }

    pub async fn unsubscribe(&self, tenant_id: &str, id: Uuid) -> Result<bool, RegistryError> {
        let removed = self.store.remove(tenant_id, id).await?;
        if removed {
            info!("Removed webhook {} for tenant {}", id, tenant_id);
        }
        Ok(removed)
    }

    pub async fn update(
        &self,
        tenant_id: &str,
        id: Uuid,
        update: SubscriptionUpdate,
    ) -> Result<Option<WebhookSubscription>, RegistryError> {
        let Some(mut subscription) = self.get(tenant_id, id).await? else {
            return Ok(None);
        };

        if let Some(url) = update.url {
            validate_url(&url)?;
            subscription.url = url;
        }
        if let Some(events) = update.events {
            if events.is_empty() {
                return Err(RegistryError::NoEvents);
            }
            subscription.events = events;
        }
        if let Some(secret) = update.secret.filter(|secret| !secret.is_empty()) {
            subscription.secret = secret;
        }
        if let Some(is_active) = update.is_active {
            subscription.is_active = is_active;
        }

        if self.store.replace(subscription.clone()).await? {
            Ok(Some(subscription))
        } else {
            Ok(None)
        }
    }

    pub async fn list(&self, tenant_id: &str) -> Result<Vec<WebhookSubscription>, RegistryError> {
        Ok(self.store.list(tenant_id).await?)
    }

    pub async fn get(
        &self,
        tenant_id: &str,
        id: Uuid,
    ) -> Result<Option<WebhookSubscription>, RegistryError> {
        Ok(self
            .store
            .list(tenant_id)
            .await?
            .into_iter()
            .find(|s| s.id == id))
    }

    /// Active subscriptions of the tenant that listen for `event`
    pub async fn active_for(
        &self,
        tenant_id: &str,
        event: WebhookEventKind,
    ) -> Result<Vec<WebhookSubscription>, RegistryError> {
        Ok(self
            .store
            .list(tenant_id)
            .await?
            .into_iter()
            .filter(|s| s.accepts(event))
            .collect())
    }

    pub async fn mark_triggered(
        &self,
        tenant_id: &str,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        if let Some(mut subscription) = self.get(tenant_id, id).await? {
            subscription.last_triggered_at = Some(at);
            self.store.replace(subscription).await?;
        }
        Ok(())
    }
}
