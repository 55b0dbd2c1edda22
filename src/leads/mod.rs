//! Lead-side collaborators.
//!
//! Leads are owned by an external store; this crate only reads them. The
//! in-memory store backs tests and standalone runs.

pub mod resolver;

use crate::models::{Lead, LeadStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::RwLock;
use thiserror::Error;

pub use resolver::{LeadResolver, StoreLeadResolver};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn poisoned() -> Self {
        Self::Unavailable("lock poisoned".to_string())
    }
}

/// Selection applied by `LeadStore::query`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LeadFilter {
    pub status: Option<LeadStatus>,
    /// Case-insensitive city equality
    pub city: Option<String>,
    pub limit: Option<usize>,
}

impl LeadFilter {
    pub fn active(limit: usize) -> Self {
        Self {
            status: Some(LeadStatus::Active),
            city: None,
            limit: Some(limit),
        }
    }

    fn accepts(&self, lead: &Lead) -> bool {
        if let Some(status) = self.status {
            if lead.status != status {
                return false;
            }
        }
        if let Some(city) = &self.city {
            match lead.search_city() {
                Some(lead_city) if lead_city.eq_ignore_ascii_case(city.trim()) => {}
                _ => return false,
            }
        }
        true
    }
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn query(&self, filter: &LeadFilter) -> Result<Vec<Lead>, StoreError>;

    async fn get(&self, lead_id: &str) -> Result<Option<Lead>, StoreError>;
}

/// Lead store kept in process memory, in insertion order
#[derive(Debug, Default)]
pub struct InMemoryLeadStore {
    leads: RwLock<Vec<Lead>>,
}

impl InMemoryLeadStore {
    pub fn new(leads: Vec<Lead>) -> Self {
        Self {
            leads: RwLock::new(leads),
        }
    }

    /// Load leads from a JSON array on disk
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read leads from {}", path.display()))?;
        let leads: Vec<Lead> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse leads in {}", path.display()))?;
        Ok(Self::new(leads))
    }

    /// Insert a lead or replace the one with the same id
    pub fn upsert(&self, lead: Lead) -> Result<(), StoreError> {
        let mut leads = self.leads.write().map_err(|_| StoreError::poisoned())?;
        match leads.iter_mut().find(|existing| existing.id == lead.id) {
            Some(existing) => *existing = lead,
            None => leads.push(lead),
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.leads.read().map(|leads| leads.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn query(&self, filter: &LeadFilter) -> Result<Vec<Lead>, StoreError> {
        let leads = self.leads.read().map_err(|_| StoreError::poisoned())?;
        let matching = leads.iter().filter(|lead| filter.accepts(lead)).cloned();
        Ok(match filter.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn get(&self, lead_id: &str) -> Result<Option<Lead>, StoreError> {
        let leads = self.leads.read().map_err(|_| StoreError::poisoned())?;
        Ok(leads.iter().find(|lead| lead.id == lead_id).cloned())
    }
}
