//! Fetch orchestration: source → dedup → store → outcome.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::sync::Arc;

use crate::config::FetchConfig;
use crate::models::{PaperRecord, SearchParams};
use crate::sources::{Source, SourceError, SourceRegistry};
use crate::store::{PaperStore, StoreError};

/// Process exit code: new records were saved
pub const EXIT_NEW_DATA: i32 = 0;
/// Process exit code: unrecoverable error
pub const EXIT_ERROR: i32 = 1;
/// Process exit code: the run was clean but produced nothing new
pub const EXIT_NO_NEW_DATA: i32 = 3;

/// Errors that end a fetch cycle
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to render JSON: {0}")]
    Render(#[from] serde_json::Error),
}

/// Result of [`PaperFetcher::fetch_by_keywords_and_return_json`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonBatch {
    /// The fetched batch, before deduplication
    pub json: String,
    /// Records that were new and got saved
    pub saved: usize,
}

/// Terminal outcome of one fetch cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    NewData { count: usize, json: Option<String> },
    NoNewData { json: Option<String> },
    Error(String),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::NewData { .. } => EXIT_NEW_DATA,
            RunOutcome::NoNewData { .. } => EXIT_NO_NEW_DATA,
            RunOutcome::Error(_) => EXIT_ERROR,
        }
    }

    /// Rendered batch, when JSON output was requested and the run succeeded
    pub fn json(&self) -> Option<&str> {
        match self {
            RunOutcome::NewData { json, .. } | RunOutcome::NoNewData { json } => json.as_deref(),
            RunOutcome::Error(_) => None,
        }
    }
}

/// Runs fetch cycles for one source against one store.
#[derive(Debug)]
pub struct PaperFetcher {
    source: Arc<dyn Source>,
    store: PaperStore,
}

impl PaperFetcher {
    pub fn new(source: Arc<dyn Source>, store: PaperStore) -> Self {
        Self { source, store }
    }

    /// Open the configured store for `source`.
    pub fn open(source: Arc<dyn Source>, config: &FetchConfig) -> Result<Self, FetchError> {
        let store = PaperStore::open(config.store_path(), config.cache_enabled)?;
        Ok(Self::new(source, store))
    }

    pub fn store(&self) -> &PaperStore {
        &self.store
    }

    /// Fetch, drop records already known, save the rest. Returns how many were saved.
    pub async fn fetch_by_keywords(
        &mut self,
        params: &SearchParams,
        max_results: usize,
    ) -> Result<usize, FetchError> {
        let (saved, _) = self.cycle(params, max_results, false).await?;
        Ok(saved.len())
    }

    /// Like [`PaperFetcher::fetch_by_keywords`], and also render the whole
    /// fetched batch as JSON.
    pub async fn fetch_by_keywords_and_return_json(
        &mut self,
        params: &SearchParams,
        max_results: usize,
    ) -> Result<JsonBatch, FetchError> {
        let (saved, json) = self.cycle(params, max_results, true).await?;
        Ok(JsonBatch {
            json: json.unwrap_or_default(),
            saved: saved.len(),
        })
    }

    /// Run one cycle and classify the result. Never returns an error.
    ///
    /// Records with neither DOI nor URL are saved but do not count as new
    /// data, since they can never be recognized on a later run.
    pub async fn run(
        &mut self,
        params: &SearchParams,
        max_results: usize,
        output_json: bool,
    ) -> RunOutcome {
        tracing::info!(
            "Fetching up to {} papers from {} for {}",
            max_results,
            self.source.name(),
            params
        );

        match self.cycle(params, max_results, output_json).await {
            Ok((saved, json)) => {
                let keyless = saved.iter().filter(|p| p.dedup_key().is_none()).count();
                if keyless > 0 {
                    tracing::warn!(
                        "Saved {} papers from {} without DOI or URL",
                        keyless,
                        self.source.name()
                    );
                }

                if keyless == saved.len() {
                    tracing::info!("No new papers from {}", self.source.name());
                    RunOutcome::NoNewData { json }
                } else {
                    let count = saved.len();
                    tracing::info!("Saved {} new papers from {}", count, self.source.name());
                    RunOutcome::NewData { count, json }
                }
            }
            Err(e) => {
                tracing::error!("Fetch from {} failed: {}", self.source.name(), e);
                RunOutcome::Error(e.to_string())
            }
        }
    }

    /// Fetch one batch, optionally render it, and save what is new.
    async fn cycle(
        &mut self,
        params: &SearchParams,
        max_results: usize,
        render: bool,
    ) -> Result<(Vec<PaperRecord>, Option<String>), FetchError> {
        let batch = self.source.fetch(params, max_results).await;
        let json = render.then(|| render_json(&batch)).transpose()?;
        let saved = self.store.save_new(batch)?;
        Ok((saved, json))
    }
}

/// Build the configured source and store, then run one cycle.
pub async fn run_with_config(config: &FetchConfig) -> RunOutcome {
    let fetcher = SourceRegistry::from_config(config)
        .and_then(|registry| registry.for_platform(config.platform))
        .map_err(FetchError::from)
        .and_then(|source| PaperFetcher::open(source, config));

    match fetcher {
        Ok(mut fetcher) => {
            fetcher
                .run(&config.search_params(), config.max_results, config.output_json)
                .await
        }
        Err(e) => {
            tracing::error!("Failed to set up {} fetch: {}", config.platform, e);
            RunOutcome::Error(e.to_string())
        }
    }
}

/// Pretty-print records with four-space indentation, the layout of the store file.
pub fn render_json(records: &[PaperRecord]) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    records.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::{make_paper, MockSource};
    use crate::sources::Platform;
    use std::fs;

    fn fetcher(source: &Arc<MockSource>, dir: &tempfile::TempDir, cache: bool) -> PaperFetcher {
        let store = PaperStore::open(dir.path().join("store.json"), cache).unwrap();
        PaperFetcher::new(source.clone(), store)
    }

    #[tokio::test]
    async fn test_known_doi_is_not_saved_again() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PaperStore::open(dir.path().join("store.json"), true).unwrap();
        store.save(&[make_paper("10.1/x", "Old")]).unwrap();

        let source = Arc::new(MockSource::with_records(vec![
            make_paper("10.1/x", "Old again"),
            make_paper("10.1/y", "New"),
        ]));
        let mut fetcher = PaperFetcher::new(source.clone(), store);

        let saved = fetcher
            .fetch_by_keywords(&SearchParams::new("x"), 10)
            .await
            .unwrap();

        assert_eq!(saved, 1);
        let titles: Vec<_> = fetcher
            .store()
            .load()
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, ["Old", "New"]);
    }

    #[tokio::test]
    async fn test_two_fetchers_on_one_store_save_a_doi_once() {
        for cache in [true, false] {
            let dir = tempfile::tempdir().unwrap();
            let source = Arc::new(MockSource::with_records(vec![make_paper("10.1/x", "X")]));

            let mut first = fetcher(&source, &dir, cache);
            let mut second = fetcher(&source, &dir, cache);
            let params = SearchParams::new("x");

            let outcome = first.run(&params, 10, false).await;
            assert_eq!(outcome.exit_code(), EXIT_NEW_DATA, "cache={}", cache);

            let outcome = second.run(&params, 10, false).await;
            assert_eq!(outcome, RunOutcome::NoNewData { json: None }, "cache={}", cache);

            assert_eq!(first.store().load().unwrap().len(), 1, "cache={}", cache);
        }
    }

    #[tokio::test]
    async fn test_records_without_identifiers_are_not_new_data() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::with_records(vec![PaperRecord::default()]));
        let mut fetcher = fetcher(&source, &dir, true);
        let params = SearchParams::new("a");

        for _ in 0..2 {
            let outcome = fetcher.run(&params, 10, false).await;
            assert_eq!(outcome, RunOutcome::NoNewData { json: None });
            assert_eq!(outcome.exit_code(), EXIT_NO_NEW_DATA);
        }
        assert_eq!(fetcher.store().load().unwrap().len(), 2);

        source.set_records(vec![PaperRecord::default(), make_paper("10.1/k", "Keyed")]);
        let outcome = fetcher.run(&params, 10, false).await;
        assert_eq!(outcome, RunOutcome::NewData { count: 2, json: None });
    }

    #[tokio::test]
    async fn test_repeats_within_batch_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut second = make_paper("10.1/z", "Second copy");
        second.url = "http://example.com/other".to_string();
        let source = Arc::new(MockSource::with_records(vec![
            make_paper("10.1/z", "First copy"),
            second,
        ]));

        let mut fetcher = fetcher(&source, &dir, false);
        let saved = fetcher
            .fetch_by_keywords(&SearchParams::new("z"), 10)
            .await
            .unwrap();
        assert_eq!(saved, 1);
    }

    #[tokio::test]
    async fn test_run_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::with_records(vec![make_paper("10.1/a", "A")]));
        let mut fetcher = fetcher(&source, &dir, true);
        let params = SearchParams::new("a");

        let first = fetcher.run(&params, 10, false).await;
        assert_eq!(first, RunOutcome::NewData { count: 1, json: None });
        assert_eq!(first.exit_code(), EXIT_NEW_DATA);

        let second = fetcher.run(&params, 10, false).await;
        assert_eq!(second, RunOutcome::NoNewData { json: None });
        assert_eq!(second.exit_code(), EXIT_NO_NEW_DATA);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_json_output_contains_unfiltered_batch() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::with_records(vec![make_paper("10.1/a", "A")]));
        let mut fetcher = fetcher(&source, &dir, true);
        fetcher
            .fetch_by_keywords(&SearchParams::new("a"), 10)
            .await
            .unwrap();

        let outcome = fetcher.run(&SearchParams::new("a"), 10, true).await;
        assert_eq!(outcome.exit_code(), EXIT_NO_NEW_DATA);

        let parsed: Vec<PaperRecord> = serde_json::from_str(outcome.json().unwrap()).unwrap();
        assert_eq!(parsed, vec![make_paper("10.1/a", "A")]);
    }

    #[tokio::test]
    async fn test_source_failure_is_no_new_data() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::new());
        source.fail_with("503");

        let outcome = fetcher(&source, &dir, true)
            .run(&SearchParams::new("a"), 10, false)
            .await;
        assert_eq!(outcome.exit_code(), EXIT_NO_NEW_DATA);
        assert!(!dir.path().join("store.json").exists());
    }

    #[tokio::test]
    async fn test_store_failure_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = Arc::new(MockSource::with_records(vec![make_paper("10.1/a", "A")]));
        let mut fetcher = fetcher(&source, &dir, false);
        fs::write(dir.path().join("store.json"), "not json").unwrap();

        let outcome = fetcher.run(&SearchParams::new("a"), 10, false).await;
        assert!(matches!(outcome, RunOutcome::Error(_)));
        assert_eq!(outcome.exit_code(), EXIT_ERROR);
        assert_eq!(outcome.json(), None);
    }

    #[tokio::test]
    async fn test_run_with_config_setup_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("results");
        fs::write(&blocker, "a file where the directory should be").unwrap();

        let config = FetchConfig {
            platform: Platform::Arxiv,
            results_dir: blocker,
            ..FetchConfig::default()
        };

        let outcome = run_with_config(&config).await;
        assert_eq!(outcome.exit_code(), EXIT_ERROR);
    }

    #[test]
    fn test_render_json_indent() {
        let json = render_json(&[make_paper("10.1/a", "A")]).unwrap();
        assert!(json.starts_with("[\n    {\n        \"title\": \"A\","));
    }
}
