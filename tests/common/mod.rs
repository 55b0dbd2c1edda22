#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use listing_sync::leads::StoreError;
use listing_sync::matching::MatchStore;
use listing_sync::models::{
    Lead, LeadMatch, LeadMetadata, LeadStatus, ListingStatus, Location, PropertyData, Source,
    Timeline,
};
use std::sync::Mutex;

pub fn lead(id: &str, tenant_id: Option<&str>, city: Option<&str>) -> Lead {
    Lead {
        id: id.to_string(),
        tenant_id: tenant_id.map(str::to_string),
        name: format!("Lead {id}"),
        city: city.map(str::to_string),
        price_range: Some("500k-750k".to_string()),
        property_type: Some("Condo".to_string()),
        metadata: LeadMetadata::default(),
        timeline: Some(Timeline::Urgent),
        status: LeadStatus::Active,
    }
}

pub fn property(id: &str, source: Source, city: &str, price: u64) -> PropertyData {
    PropertyData {
        id: id.to_string(),
        source,
        address: "100 Queen St W".to_string(),
        location: Location {
            city: city.to_string(),
            state: "ON".to_string(),
            zip: "M5H 2N2".to_string(),
            latitude: Some(43.6532),
            longitude: Some(-79.3832),
        },
        price,
        beds: 2,
        baths: 2.0,
        sqft: 850,
        lot_size: None,
        year_built: Some(2015),
        property_type: "Condo".to_string(),
        listing_status: ListingStatus::Active,
        days_on_market: 8,
        description: "Corner unit with lake views".to_string(),
        images: vec![],
        features: vec!["Balcony".to_string()],
        agent: None,
        last_updated: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
    }
}

/// Match store that records every save call
#[derive(Default)]
pub struct RecordingMatchStore {
    pub saves: Mutex<Vec<(String, Source, Vec<LeadMatch>)>>,
}

impl RecordingMatchStore {
    pub fn saved_leads(&self) -> Vec<String> {
        self.saves
            .lock()
            .unwrap()
            .iter()
            .map(|(lead, _, _)| lead.clone())
            .collect()
    }
}

#[async_trait]
impl MatchStore for RecordingMatchStore {
    async fn save(
        &self,
        lead_id: &str,
        source: Source,
        matches: Vec<LeadMatch>,
    ) -> Result<(), StoreError> {
        self.saves
            .lock()
            .unwrap()
            .push((lead_id.to_string(), source, matches));
        Ok(())
    }

    async fn matches_for_lead(&self, lead_id: &str) -> Result<Vec<LeadMatch>, StoreError> {
        Ok(self
            .saves
            .lock()
            .unwrap()
            .iter()
            .filter(|(lead, _, _)| lead == lead_id)
            .flat_map(|(_, _, matches)| matches.clone())
            .collect())
    }

    async fn leads_for_property(
        &self,
        _source: Option<Source>,
        _property_id: &str,
    ) -> Result<Vec<String>, StoreError> {
        Ok(vec![])
    }
}

pub fn lead_match(lead_id: &str, property: PropertyData, score: f64) -> LeadMatch {
    LeadMatch {
        lead_id: lead_id.to_string(),
        property_id: property.id.clone(),
        source: property.source,
        score,
        reasons: vec!["Location matches preferred city".to_string()],
        recommendations: vec![],
        property,
    }
}
