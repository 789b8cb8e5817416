//! ISSN enrichment through a per-DOI metadata lookup.

use async_trait::async_trait;

use crate::models::{join_issns, PaperRecord};
use crate::sources::SourceError;

/// A service that can report the ISSNs of the venue a DOI was published in.
#[async_trait]
pub trait IssnLookup: Send + Sync + std::fmt::Debug {
    async fn issns_for_doi(&self, doi: &str) -> Result<Vec<String>, SourceError>;
}

/// Fill in `issn` for a record that has a DOI.
///
/// Records without a DOI are returned untouched and no lookup is made. A
/// successful lookup overwrites `issn` (`N/A` when the list is empty); a
/// failed one is logged and leaves the prior value in place.
pub async fn enrich_issn(mut record: PaperRecord, lookup: &dyn IssnLookup) -> PaperRecord {
    let Some(doi) = record.doi().map(str::to_string) else {
        return record;
    };

    match lookup.issns_for_doi(&doi).await {
        Ok(issns) => record.issn = join_issns(issns),
        Err(e) => tracing::warn!("ISSN lookup failed for DOI {}: {}", doi, e),
    }

    record
}
