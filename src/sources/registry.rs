use crate::models::{PropertyData, Source};
use crate::sources::traits::SourceAdapter;
use crate::sources::types::SearchCriteria;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Configured listing providers, keyed by source
#[derive(Clone, Default)]
pub struct ListingSources {
    adapters: BTreeMap<Source, Arc<dyn SourceAdapter>>,
}

impl ListingSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter, replacing any previous one for the same source
    pub fn register(&mut self, adapter: Arc<dyn SourceAdapter>) {
        self.adapters.insert(adapter.source(), adapter);
    }

    pub fn sources(&self) -> Vec<Source> {
        self.adapters.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Ad hoc search across several providers, outside the sync schedule.
    ///
    /// Providers are queried concurrently. An unavailable provider is logged
    /// and contributes nothing; results keep the order of `sources`.
    pub async fn search_properties(
        &self,
        criteria: &SearchCriteria,
        sources: &[Source],
    ) -> Vec<PropertyData> {
        let mut adapters = Vec::with_capacity(sources.len());
        for source in sources {
            match self.adapters.get(source) {
                Some(adapter) => adapters.push(adapter.clone()),
                None => warn!("No adapter configured for {}", source),
            }
        }

        let results = join_all(
            adapters
                .iter()
                .map(|adapter| adapter.search_properties(criteria)),
        )
        .await;

        let mut properties = Vec::new();
        for (adapter, result) in adapters.iter().zip(results) {
            match result {
                Ok(mut found) => properties.append(&mut found),
                Err(err) => warn!("Skipping {}: {}", adapter.source(), err),
            }
        }

        info!(
            "Ad hoc search in {} returned {} listings",
            criteria.city,
            properties.len()
        );

        properties
    }
}
