//! Mock source for testing purposes.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::models::{PaperBuilder, PaperRecord, SearchParams};
use crate::sources::{Source, SourceError};

/// A mock source for testing that returns predefined records.
#[derive(Debug, Default)]
pub struct MockSource {
    records: Mutex<Vec<PaperRecord>>,
    failure: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl MockSource {
    /// Create a new mock source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock source that returns `records` on every search.
    pub fn with_records(records: Vec<PaperRecord>) -> Self {
        let source = Self::new();
        source.set_records(records);
        source
    }

    /// Set the records to return.
    pub fn set_records(&self, records: Vec<PaperRecord>) {
        if let Ok(mut guard) = self.records.lock() {
            *guard = records;
        }
        self.clear_failure();
    }

    /// Make every following search fail with a network error.
    pub fn fail_with(&self, message: &str) {
        if let Ok(mut guard) = self.failure.lock() {
            *guard = Some(message.to_string());
        }
    }

    pub fn clear_failure(&self) {
        if let Ok(mut guard) = self.failure.lock() {
            *guard = None;
        }
    }

    /// Number of searches made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Source for MockSource {
    fn id(&self) -> &str {
        "mock"
    }

    fn name(&self) -> &str {
        "Mock Source"
    }

    async fn search(
        &self,
        _params: &SearchParams,
        max_results: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failure = self
            .failure
            .lock()
            .map_err(|e| SourceError::Other(e.to_string()))?
            .clone();
        if let Some(message) = failure {
            return Err(SourceError::Network(message));
        }

        let records = self
            .records
            .lock()
            .map_err(|e| SourceError::Other(e.to_string()))?;
        Ok(records.iter().take(max_results).cloned().collect())
    }
}

/// Helper function to create a mock paper for testing.
pub fn make_paper(doi: &str, title: &str) -> PaperRecord {
    PaperBuilder::new(title)
        .authors(["Test Author"])
        .year("2024")
        .doi(doi)
        .url(format!("http://example.com/{}", doi))
        .build()
}
