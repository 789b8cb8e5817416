//! # Paper Fetcher
//!
//! Fetches bibliographic records from academic search services, normalizes
//! them into one record shape, drops records already seen and appends the
//! rest to a JSON store that several processes can share.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (PaperRecord, SearchParams)
//! - [`sources`]: Source adapters for PubMed, arXiv, CrossRef and Google Scholar
//! - [`store`]: Lock-guarded JSON store with atomic rewrites
//! - [`fetcher`]: The fetch cycle and its exit outcome
//! - [`utils`]: HTTP client, retry/backoff and deduplication
//! - [`config`]: Configuration management

pub mod config;
pub mod fetcher;
pub mod models;
pub mod sources;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use fetcher::{run_with_config, PaperFetcher, RunOutcome};
pub use models::{PaperRecord, SearchParams};
pub use sources::{Platform, Source, SourceRegistry};
pub use store::PaperStore;
