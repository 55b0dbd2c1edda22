use crate::leads::StoreError;
use crate::models::{LeadMatch, Source};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Persistence for ranked matches.
///
/// A save replaces the whole set for `(lead_id, source)`; sets from
/// different sources are never merged.
#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn save(
        &self,
        lead_id: &str,
        source: Source,
        matches: Vec<LeadMatch>,
    ) -> Result<(), StoreError>;

    /// Every stored match for the lead, grouped by source
    async fn matches_for_lead(&self, lead_id: &str) -> Result<Vec<LeadMatch>, StoreError>;

    /// Leads holding a match on the property, optionally limited to one source
    async fn leads_for_property(
        &self,
        source: Option<Source>,
        property_id: &str,
    ) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug, Default)]
pub struct InMemoryMatchStore {
    sets: RwLock<BTreeMap<(String, Source), Vec<LeadMatch>>>,
}

#[async_trait]
impl MatchStore for InMemoryMatchStore {
    async fn save(
        &self,
        lead_id: &str,
        source: Source,
        matches: Vec<LeadMatch>,
    ) -> Result<(), StoreError> {
        let mut sets = self.sets.write().map_err(|_| StoreError::poisoned())?;
        sets.insert((lead_id.to_string(), source), matches);
        Ok(())
    }

    async fn matches_for_lead(&self, lead_id: &str) -> Result<Vec<LeadMatch>, StoreError> {
        let sets = self.sets.read().map_err(|_| StoreError::poisoned())?;
        Ok(sets
            .iter()
            .filter(|((lead, _), _)| lead == lead_id)
            .flat_map(|(_, matches)| matches.iter().cloned())
            .collect())
    }

    async fn leads_for_property(
        &self,
        source: Option<Source>,
        property_id: &str,
    ) -> Result<Vec<String>, StoreError> {
        let sets = self.sets.read().map_err(|_| StoreError::poisoned())?;
        let mut leads: Vec<String> = sets
            .iter()
            .filter(|((_, set_source), _)| source.map_or(true, |wanted| wanted == *set_source))
            .filter(|(_, matches)| matches.iter().any(|m| m.property_id == property_id))
            .map(|((lead, _), _)| lead.clone())
            .collect();
        leads.dedup();
        Ok(leads)
    }
}
