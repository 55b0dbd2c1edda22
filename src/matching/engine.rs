use crate::leads::{LeadStore, StoreError};
use crate::matching::store::MatchStore;
use crate::models::{Lead, LeadMatch, ListingStatus, PriceRange, PropertyData, Source, Timeline};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub const CITY_WEIGHT: f64 = 0.30;
pub const PRICE_WEIGHT: f64 = 0.25;
pub const PROPERTY_TYPE_WEIGHT: f64 = 0.20;
pub const BEDROOM_WEIGHT: f64 = 0.15;
pub const URGENT_WEIGHT: f64 = 0.10;
pub const FLEXIBLE_WEIGHT: f64 = 0.05;

/// The weighted sum is always divided by the number of factors, whether or
/// not they fired. The highest reachable score is therefore 0.2.
pub const FACTOR_COUNT: f64 = 5.0;

/// Matches must score strictly above this to be kept.
pub const RETENTION_THRESHOLD: f64 = 0.6;

pub const MAX_MATCHES_PER_LEAD: usize = 5;

/// Tolerance around a bucket that still earns partial price credit.
/// A bucket widened by a tenth of its bounds on each side still counts as near.
const NEAR_BUCKET_DIVISOR: u64 = 10;

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("lead {0} not found")]
    LeadNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where a price falls relative to a lead's budget bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceFit {
    Within,
    Near,
    Outside,
}

impl PriceFit {
    pub fn of(bucket: PriceRange, price: u64) -> Self {
        let (min, max) = bucket.bounds();
        let (near_min, near_max) = Self::near_bounds(bucket);

        if price >= min && max.map_or(true, |max| price <= max) {
            PriceFit::Within
        } else if price >= near_min && near_max.map_or(true, |max| price <= max) {
            PriceFit::Near
        } else {
            PriceFit::Outside
        }
    }

    /// Widest price band that does not score as `Outside`
    pub fn near_bounds(bucket: PriceRange) -> (u64, Option<u64>) {
        let (min, max) = bucket.bounds();
        (
            min - min / NEAR_BUCKET_DIVISOR,
            max.map(|max| max.saturating_add(max / NEAR_BUCKET_DIVISOR)),
        )
    }

    pub fn score(&self) -> f64 {
        match self {
            PriceFit::Within => 1.0,
            PriceFit::Near => 0.5,
            PriceFit::Outside => 0.0,
        }
    }
}

pub fn price_range_score(bucket: PriceRange, price: u64) -> f64 {
    PriceFit::of(bucket, price).score()
}

/// Which scoring predicates fired for a (lead, property) pair.
///
/// Score and reasons are both derived from this, so a reason is emitted
/// exactly when its factor contributed.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchEvaluation {
    pub city: bool,
    pub price: Option<(PriceRange, PriceFit)>,
    pub property_type: bool,
    /// Requested minimum, set only when the property satisfies it
    pub bedrooms: Option<u32>,
    /// Timeline that earned urgency credit
    pub urgency: Option<Timeline>,
}

impl MatchEvaluation {
    pub fn evaluate(lead: &Lead, property: &PropertyData) -> Self {
        let city = lead
            .search_city()
            .map_or(false, |city| city.eq_ignore_ascii_case(property.city().trim()));

        let price = lead
            .price_bucket()
            .map(|bucket| (bucket, PriceFit::of(bucket, property.price)));

        let property_type = lead.property_type.as_deref().map_or(false, |wanted| {
            wanted.trim().eq_ignore_ascii_case(property.property_type.trim())
        });

        let bedrooms = lead
            .metadata
            .bedrooms
            .filter(|wanted| property.beds >= *wanted);

        let urgency = match lead.timeline {
            Some(Timeline::Urgent) if property.days_on_market < 30 => Some(Timeline::Urgent),
            Some(Timeline::Flexible) if property.days_on_market < 90 => Some(Timeline::Flexible),
            _ => None,
        };

        Self {
            city,
            price,
            property_type,
            bedrooms,
            urgency,
        }
    }

    pub fn weighted_sum(&self) -> f64 {
        let mut sum = 0.0;
        if self.city {
            sum += CITY_WEIGHT;
        }
        if let Some((_, fit)) = self.price {
            sum += PRICE_WEIGHT * fit.score();
        }
        if self.property_type {
            sum += PROPERTY_TYPE_WEIGHT;
        }
        if self.bedrooms.is_some() {
            sum += BEDROOM_WEIGHT;
        }
        sum += match self.urgency {
            Some(Timeline::Urgent) => URGENT_WEIGHT,
            Some(Timeline::Flexible) => FLEXIBLE_WEIGHT,
            _ => 0.0,
        };
        sum
    }

    pub fn score(&self) -> f64 {
        (self.weighted_sum() / FACTOR_COUNT).clamp(0.0, 1.0)
    }

    pub fn reasons(&self, property: &PropertyData) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.city {
            reasons.push(format!("Located in {}", property.city()));
        }
        match self.price {
            Some((bucket, PriceFit::Within)) => reasons.push(format!(
                "Priced at ${} within your {} budget",
                property.price, bucket
            )),
            Some((bucket, PriceFit::Near)) => reasons.push(format!(
                "Priced at ${}, slightly outside your {} budget",
                property.price, bucket
            )),
            _ => {}
        }
        if self.property_type {
            reasons.push(format!(
                "Matches your preferred property type ({})",
                property.property_type
            ));
        }
        if let Some(wanted) = self.bedrooms {
            reasons.push(format!(
                "{} bedrooms meets your minimum of {}",
                property.beds, wanted
            ));
        }
        match self.urgency {
            Some(Timeline::Urgent) => reasons.push(format!(
                "Fresh listing ({} days on market) suits an urgent timeline",
                property.days_on_market
            )),
            Some(Timeline::Flexible) => reasons.push(format!(
                "Listed {} days ago, within a flexible timeline",
                property.days_on_market
            )),
            _ => {}
        }
        reasons
    }
}

pub fn calculate_match_score(lead: &Lead, property: &PropertyData) -> f64 {
    MatchEvaluation::evaluate(lead, property).score()
}

/// Advice attached to a match, independent of the score
pub fn recommendations(property: &PropertyData) -> Vec<String> {
    let mut recommendations = Vec::new();
    if property.days_on_market < 7 {
        recommendations.push("Act quickly - this listing is new to the market".to_string());
    }
    if property.price > 750_000 {
        recommendations.push("Consider mortgage pre-approval".to_string());
    }
    if property.days_on_market > 60 {
        recommendations
            .push("Listed for over 60 days - there may be room to negotiate".to_string());
    }
    if property.listing_status == ListingStatus::Pending {
        recommendations.push("Listing is pending - confirm availability with the agent".to_string());
    }
    recommendations
}

/// Score every property for the lead, keeping input order and all scores
pub fn score_properties(lead: &Lead, properties: &[PropertyData], source: Source) -> Vec<LeadMatch> {
    properties
        .iter()
        .map(|property| {
            let evaluation = MatchEvaluation::evaluate(lead, property);
            LeadMatch {
                lead_id: lead.id.clone(),
                property_id: property.id.clone(),
                source,
                score: evaluation.score(),
                reasons: evaluation.reasons(property),
                property: property.clone(),
                recommendations: recommendations(property),
            }
        })
        .collect()
}

/// Keep matches above the threshold, best first, at most five.
///
/// The sort is stable, so equal scores keep their input order.
pub fn select_top_matches(candidates: Vec<LeadMatch>) -> Vec<LeadMatch> {
    let mut retained: Vec<LeadMatch> = candidates
        .into_iter()
        .filter(|candidate| candidate.score > RETENTION_THRESHOLD)
        .collect();
    retained.sort_by(|a, b| b.score.total_cmp(&a.score));
    retained.truncate(MAX_MATCHES_PER_LEAD);
    retained
}

/// Scores fetched listings against leads and persists the ranked result
#[derive(Clone)]
pub struct MatchingEngine {
    leads: Arc<dyn LeadStore>,
    matches: Arc<dyn MatchStore>,
}

impl MatchingEngine {
    pub fn new(leads: Arc<dyn LeadStore>, matches: Arc<dyn MatchStore>) -> Self {
        Self { leads, matches }
    }

    /// Score `properties` for one lead and replace that lead's match set
    /// for `source`, even when nothing qualifies.
    pub async fn process_property_matches(
        &self,
        lead_id: &str,
        properties: &[PropertyData],
        source: Source,
    ) -> Result<Vec<LeadMatch>, MatchError> {
        let lead = self
            .leads
            .get(lead_id)
            .await?
            .ok_or_else(|| MatchError::LeadNotFound(lead_id.to_string()))?;

        let candidates = score_properties(&lead, properties, source);
        if let Some(best) = candidates.iter().map(|c| c.score).reduce(f64::max) {
            debug!(
                "Best score for lead {} from {}: {:.3} across {} listings",
                lead_id,
                source,
                best,
                candidates.len()
            );
        }

        let top = select_top_matches(candidates);
        self.matches.save(lead_id, source, top.clone()).await?;

        info!(
            "Stored {} matches for lead {} from {}",
            top.len(),
            lead_id,
            source
        );

        Ok(top)
    }

    /// Stored matches for the lead across all sources
    pub async fn get_property_matches(&self, lead_id: &str) -> Result<Vec<LeadMatch>, MatchError> {
        if self.leads.get(lead_id).await?.is_none() {
            return Err(MatchError::LeadNotFound(lead_id.to_string()));
        }
        Ok(self.matches.matches_for_lead(lead_id).await?)
    }
}
