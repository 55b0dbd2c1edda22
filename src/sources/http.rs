use crate::models::{PropertyData, Source};
use crate::sources::traits::{SourceAdapter, SourceError};
use crate::sources::types::SearchCriteria;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Adapter for providers exposing a normalized JSON listing feed
pub struct HttpListingAdapter {
    client: Client,
    source: Source,
    base_url: String,
}

impl HttpListingAdapter {
    /// Create an adapter for `source` rooted at `base_url`
    pub fn new(source: Source, base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(source, base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(
        source: Source,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("listing-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            source,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, criteria: &SearchCriteria) -> Result<Vec<PropertyData>> {
        let url = format!("{}/properties", self.base_url);

        debug!("Fetching {} listings from {}", self.source, url);

        let response = self
            .client
            .get(&url)
            .query(criteria)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", url))?;

        if !response.status().is_success() {
            warn!("{} returned status: {}", self.source, response.status());
            anyhow::bail!("listing feed returned {}", response.status());
        }

        let mut properties: Vec<PropertyData> = response
            .json()
            .await
            .context("Failed to decode listing feed")?;

        // The feed is trusted for content, not for provenance.
        for property in &mut properties {
            property.source = self.source;
        }

        info!(
            "Fetched {} listings from {} for {}",
            properties.len(),
            self.source,
            criteria.city
        );

        Ok(properties)
    }
}

#[async_trait]
impl SourceAdapter for HttpListingAdapter {
    async fn search_properties(
        &self,
        criteria: &SearchCriteria,
    ) -> Result<Vec<PropertyData>, SourceError> {
        self.fetch(criteria)
            .await
            .map_err(|err| SourceError::unavailable(self.source, format!("{err:#}")))
    }

    fn source(&self) -> Source {
        self.source
    }
}
