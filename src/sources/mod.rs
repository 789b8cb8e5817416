//! Source adapters with a shared trait-based contract.
//!
//! Every adapter implements [`Source`]: it builds a source-specific query from
//! [`SearchParams`], calls the remote service and parses the response into
//! [`PaperRecord`]s. Adapters report failures through [`Source::search`];
//! callers that only want records use [`Source::fetch`], which logs the
//! failure and yields an empty batch instead.
//!
//! | Platform | Adapter | Remote |
//! |---|---|---|
//! | `pubmed` | [`PubMedSource`] | NCBI E-utilities (esearch + efetch per id) |
//! | `arxiv` | [`ArxivSource`] | arXiv Atom API |
//! | `crossref` | [`CrossRefSource`] | CrossRef REST API |
//! | `google_scholar` | [`GoogleScholarSource`] | scraped result pages, with backoff and CrossRef ISSN enrichment |

mod arxiv;
mod crossref;
mod enrich;
mod google_scholar;
mod pubmed;
mod registry;

pub mod mock;

pub use arxiv::ArxivSource;
pub use crossref::CrossRefSource;
pub use enrich::{enrich_issn, IssnLookup};
pub use google_scholar::{GoogleScholarSource, ScholarBackend, ScholarHit, ScholarScraper};
pub use mock::MockSource;
pub use pubmed::PubMedSource;
pub use registry::{SourceCapabilities, SourceRegistry};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{PaperRecord, SearchParams};

/// The Source trait defines the interface for all source adapters.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Unique identifier for this source (matches [`Platform::id`])
    fn id(&self) -> &str;

    /// Human-readable name of this source
    fn name(&self) -> &str;

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH
    }

    /// Search the remote service, returning at most `max_results` records.
    async fn search(
        &self,
        params: &SearchParams,
        max_results: usize,
    ) -> Result<Vec<PaperRecord>, SourceError>;

    /// Like [`Source::search`], but a failure is logged and becomes an empty batch.
    async fn fetch(&self, params: &SearchParams, max_results: usize) -> Vec<PaperRecord> {
        match self.search(params, max_results).await {
            Ok(records) => {
                tracing::info!("{} returned {} papers", self.name(), records.len());
                records
            }
            Err(e) => {
                tracing::error!("Error fetching papers from {}: {}", self.name(), e);
                Vec::new()
            }
        }
    }
}

/// Errors that can occur when interacting with a source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Network or HTTP error
    #[error("Network error: {0}")]
    Network(String),

    /// Parsing error (XML, JSON, HTML, etc.)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Paper not found
    #[error("Paper not found: {0}")]
    NotFound(String),

    /// API error from the source
    #[error("API error: {0}")]
    Api(String),

    /// IO error (file system)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::Error> for SourceError {
    fn from(err: quick_xml::Error) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}

/// Which source adapter a fetch cycle uses
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    #[value(name = "pubmed")]
    #[serde(rename = "pubmed")]
    PubMed,
    #[value(name = "arxiv")]
    Arxiv,
    #[value(name = "crossref")]
    #[serde(rename = "crossref")]
    CrossRef,
    #[value(name = "google_scholar")]
    GoogleScholar,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::PubMed,
        Platform::Arxiv,
        Platform::CrossRef,
        Platform::GoogleScholar,
    ];

    /// Source identifier (registry key)
    pub fn id(&self) -> &'static str {
        match self {
            Platform::PubMed => "pubmed",
            Platform::Arxiv => "arxiv",
            Platform::CrossRef => "crossref",
            Platform::GoogleScholar => "google_scholar",
        }
    }

    /// Store file used when no output file name is configured
    pub fn default_output_file(&self) -> &'static str {
        match self {
            Platform::PubMed => "pubmed_res.json",
            Platform::Arxiv => "arxiv_res.json",
            Platform::CrossRef => "crossref_res.json",
            Platform::GoogleScholar => "gs_res.json",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl std::str::FromStr for Platform {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.id() == wanted)
            .ok_or_else(|| SourceError::InvalidRequest(format!("Unknown platform '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_capabilities() {
        let caps = SourceCapabilities::SEARCH | SourceCapabilities::DOI_LOOKUP;

        assert!(caps.contains(SourceCapabilities::SEARCH));
        assert!(caps.contains(SourceCapabilities::DOI_LOOKUP));
    }

    #[test]
    fn test_platform_ids_round_trip() {
        for platform in Platform::ALL {
            assert_eq!(platform.id().parse::<Platform>().unwrap(), platform);
        }
        assert!("scopus".parse::<Platform>().is_err());
    }

    #[test]
    fn test_platform_serde_names() {
        let json = serde_json::to_string(&Platform::GoogleScholar).unwrap();
        assert_eq!(json, "\"google_scholar\"");
        let parsed: Platform = serde_json::from_str("\"crossref\"").unwrap();
        assert_eq!(parsed, Platform::CrossRef);
    }

    #[tokio::test]
    async fn test_fetch_swallows_errors() {
        let source = MockSource::new();
        source.fail_with("connection reset");

        let records = source.fetch(&SearchParams::new("x"), 5).await;
        assert!(records.is_empty());
    }
}
