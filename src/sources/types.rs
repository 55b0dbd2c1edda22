use crate::matching::PriceFit;
use crate::models::Lead;
use serde::{Deserialize, Serialize};

/// Search parameters sent to a listing provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SearchCriteria {
    /// City to search in
    pub city: String,
    /// State or province
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Minimum price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<u64>,
    /// Maximum price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<u64>,
    /// Property type, e.g. "Condo"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    /// Minimum number of bedrooms
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_beds: Option<u32>,
    /// Maximum number of results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl SearchCriteria {
    pub fn for_city(city: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            ..Self::default()
        }
    }

    /// Build provider criteria from a lead's stored preferences.
    ///
    /// The budget bucket is widened to the band that still scores as near.
    /// Returns `None` when the lead has no usable city.
    pub fn for_lead(lead: &Lead) -> Option<Self> {
        let city = lead.search_city()?;
        let (min_price, max_price) = match lead.price_bucket() {
            Some(bucket) => {
                let (min, max) = PriceFit::near_bounds(bucket);
                (Some(min), max)
            }
            None => (None, None),
        };

        Some(Self {
            city: city.to_string(),
            state: None,
            min_price,
            max_price,
            property_type: lead.property_type.clone(),
            min_beds: lead.metadata.bedrooms,
            limit: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LeadMetadata, LeadStatus, PriceRange};

    #[test]
    fn criteria_from_lead_covers_near_band() {
        let lead = Lead {
            id: "lead-1".to_string(),
            tenant_id: None,
            name: "Ada".to_string(),
            city: Some("Toronto".to_string()),
            price_range: Some("1M+".to_string()),
            property_type: Some("Detached".to_string()),
            metadata: LeadMetadata {
                bedrooms: Some(4),
                ..LeadMetadata::default()
            },
            timeline: None,
            status: LeadStatus::Active,
        };

        let criteria = SearchCriteria::for_lead(&lead).unwrap();
        assert_eq!(criteria.city, "Toronto");
        assert_eq!(criteria.min_price, Some(900_000));
        assert_eq!(criteria.max_price, None);
        assert_eq!(criteria.min_beds, Some(4));

        let bounded = Lead {
            price_range: Some("500k-750k".to_string()),
            ..lead
        };
        let criteria = SearchCriteria::for_lead(&bounded).unwrap();
        assert_eq!(criteria.min_price, Some(450_000));
        assert_eq!(criteria.max_price, Some(825_000));
        for edge in [criteria.min_price.unwrap(), criteria.max_price.unwrap()] {
            assert_eq!(
                PriceFit::of(PriceRange::From500kTo750k, edge),
                PriceFit::Near
            );
        }
    }

    #[test]
    fn criteria_requires_a_city() {
        let lead: Lead = serde_json::from_value(serde_json::json!({ "id": "lead-2" })).unwrap();
        assert!(SearchCriteria::for_lead(&lead).is_none());
    }
}
