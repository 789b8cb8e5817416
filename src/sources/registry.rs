//! Registry mapping platform ids to source adapters.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    arxiv::ArxivSource, crossref::CrossRefSource, google_scholar::GoogleScholarSource,
    pubmed::PubMedSource, Platform, Source, SourceError,
};
use crate::config::FetchConfig;
use crate::utils::{BackoffPolicy, HttpClient};

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        const DOI_LOOKUP = 1 << 1;
    }
}

/// Registry for all available source adapters
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding all four adapters, sharing one HTTP client.
    pub fn from_config(config: &FetchConfig) -> Result<Self, SourceError> {
        let client = Arc::new(HttpClient::new(&config.http)?);
        let crossref = Arc::new(CrossRefSource::new(Arc::clone(&client)));

        let mut registry = Self::new();
        registry.register(Arc::new(PubMedSource::new(Arc::clone(&client))));
        registry.register(Arc::new(ArxivSource::new(Arc::clone(&client))));
        registry.register(Arc::new(GoogleScholarSource::new(
            Arc::clone(&client),
            crossref.clone(),
            BackoffPolicy::from(&config.retry),
        )));
        registry.register(crossref);

        Ok(registry)
    }

    /// Register a new source
    pub fn register(&mut self, source: Arc<dyn Source>) {
        self.sources.insert(source.id().to_string(), source);
    }

    /// Get a source by ID
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Source>> {
        self.sources.get(id)
    }

    /// Get the source for a platform, returning an error if not registered
    pub fn for_platform(&self, platform: Platform) -> Result<Arc<dyn Source>, SourceError> {
        self.get(platform.id())
            .cloned()
            .ok_or_else(|| SourceError::NotFound(format!("Source '{}' not found", platform)))
    }

    /// Get sources that support a specific capability
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&Arc<dyn Source>> {
        self.sources
            .values()
            .filter(|s| s.capabilities().contains(capability))
            .collect()
    }

    /// Check if a source exists
    pub fn has(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_from_config() {
        let registry = SourceRegistry::from_config(&FetchConfig::default()).unwrap();

        assert_eq!(registry.len(), 4);
        for platform in Platform::ALL {
            assert!(registry.has(platform.id()), "{} should be registered", platform);
            assert_eq!(registry.for_platform(platform).unwrap().id(), platform.id());
        }
    }

    #[test]
    fn test_doi_lookup_capability() {
        let registry = SourceRegistry::from_config(&FetchConfig::default()).unwrap();

        let doi_sources = registry.with_capability(SourceCapabilities::DOI_LOOKUP);
        assert_eq!(doi_sources.len(), 1);
        assert_eq!(doi_sources[0].id(), "crossref");
        assert_eq!(registry.with_capability(SourceCapabilities::SEARCH).len(), 4);
    }

    #[test]
    fn test_missing_platform() {
        let registry = SourceRegistry::new();
        assert!(registry.is_empty());
        assert!(matches!(
            registry.for_platform(Platform::Arxiv),
            Err(SourceError::NotFound(_))
        ));
    }
}
