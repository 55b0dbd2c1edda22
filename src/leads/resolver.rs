use crate::leads::{LeadFilter, LeadStore, StoreError};
use crate::matching::{MatchStore, PriceFit};
use crate::models::{Lead, LeadStatus, PropertyData, Source};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Finds the leads affected by a provider push event
#[async_trait]
pub trait LeadResolver: Send + Sync {
    /// Active leads whose stored criteria loosely fit a new listing
    async fn leads_for_listing(&self, property: &PropertyData) -> Result<Vec<Lead>, StoreError>;

    /// Leads that currently hold a match on the property
    async fn leads_matched_to(
        &self,
        source: Option<Source>,
        property_id: &str,
    ) -> Result<Vec<Lead>, StoreError>;
}

/// Resolver backed by the lead and match stores
pub struct StoreLeadResolver {
    leads: Arc<dyn LeadStore>,
    matches: Arc<dyn MatchStore>,
}

impl StoreLeadResolver {
    pub fn new(leads: Arc<dyn LeadStore>, matches: Arc<dyn MatchStore>) -> Self {
        Self { leads, matches }
    }
}

/// Same city is required; type and budget only exclude when the lead states them.
fn loosely_fits(lead: &Lead, property: &PropertyData) -> bool {
    let type_fits = lead.property_type.as_deref().map_or(true, |wanted| {
        wanted.trim().eq_ignore_ascii_case(property.property_type.trim())
    });
    let budget_fits = lead
        .price_bucket()
        .map_or(true, |bucket| PriceFit::of(bucket, property.price) != PriceFit::Outside);
    type_fits && budget_fits
}

#[async_trait]
impl LeadResolver for StoreLeadResolver {
    async fn leads_for_listing(&self, property: &PropertyData) -> Result<Vec<Lead>, StoreError> {
        let filter = LeadFilter {
            status: Some(LeadStatus::Active),
            city: Some(property.city().to_string()),
            limit: None,
        };
        let candidates = self.leads.query(&filter).await?;
        let total = candidates.len();
        let resolved: Vec<Lead> = candidates
            .into_iter()
            .filter(|lead| loosely_fits(lead, property))
            .collect();

        debug!(
            "Listing {} fits {} of {} leads in {}",
            property.id,
            resolved.len(),
            total,
            property.city()
        );
        Ok(resolved)
    }

    async fn leads_matched_to(
        &self,
        source: Option<Source>,
        property_id: &str,
    ) -> Result<Vec<Lead>, StoreError> {
        let lead_ids = self.matches.leads_for_property(source, property_id).await?;
        let mut leads = Vec::with_capacity(lead_ids.len());
        for lead_id in lead_ids {
            if let Some(lead) = self.leads.get(&lead_id).await? {
                leads.push(lead);
            }
        }
        Ok(leads)
    }
}
