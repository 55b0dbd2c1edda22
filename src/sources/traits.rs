use crate::models::{PropertyData, Source};
use crate::sources::types::SearchCriteria;
use async_trait::async_trait;
use thiserror::Error;

/// Single failure classification for every provider.
///
/// Adapters flatten their transport and parse errors into `reason` so that
/// provider-specific error types never escape the adapter.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SourceError {
    #[error("{provider} is unavailable: {reason}")]
    Unavailable { provider: Source, reason: String },
}

impl SourceError {
    pub fn unavailable(provider: Source, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            provider,
            reason: reason.into(),
        }
    }
}

/// Common trait for all listing providers
/// This allows new providers to be plugged in next to Zillow, Realtor and MLS
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Search the provider for listings matching the criteria
    async fn search_properties(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<PropertyData>, SourceError>;

    /// Provider this adapter pulls from
    fn source(&self) -> Source;
}
