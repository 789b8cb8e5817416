//! arXiv source implementation.

use async_trait::async_trait;
use chrono::Datelike;
use feed_rs::parser;
use std::sync::Arc;

use crate::models::{PaperBuilder, PaperRecord, SearchParams};
use crate::sources::{Source, SourceError};
use crate::utils::{get_text, HttpClient};

/// Base URL for arXiv API
const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";

/// Query used when no search terms are given: everything, newest first
const LATEST_QUERY: &str = "all:*";

/// arXiv source
///
/// All search terms are folded into a single free-text `all:` query.
/// arXiv records carry no DOI; the abstract URL is the dedup key.
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: Arc<HttpClient>,
    api_url: String,
}

impl ArxivSource {
    /// Create a new arXiv source
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self::with_api_url(client, ARXIV_API_URL)
    }

    /// Create with a custom API URL (for testing)
    pub fn with_api_url(client: Arc<HttpClient>, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    /// Build the `search_query` value; `None` when no terms are set.
    pub fn build_query(params: &SearchParams) -> Option<String> {
        let terms: Vec<&str> = [params.keyword_term(), params.author_term(), params.year_term()]
            .into_iter()
            .flatten()
            .collect();

        (!terms.is_empty()).then(|| format!("all:{}", terms.join(" ")))
    }

    /// Parse an Atom feed into records
    pub fn parse_feed(xml: &[u8]) -> Result<Vec<PaperRecord>, SourceError> {
        let feed = parser::parse(xml)
            .map_err(|e| SourceError::Parse(format!("Failed to parse Atom feed: {}", e)))?;

        Ok(feed.entries.iter().map(Self::parse_entry).collect())
    }

    fn parse_entry(entry: &feed_rs::model::Entry) -> PaperRecord {
        let title = entry
            .title
            .as_ref()
            .map(|t| t.content.split_whitespace().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();

        let abstract_text = entry
            .summary
            .as_ref()
            .map(|s| s.content.trim().to_string())
            .unwrap_or_default();

        let year = entry
            .published
            .map(|d| d.year().to_string())
            .unwrap_or_default();

        PaperBuilder::new(title)
            .authors(entry.authors.iter().map(|a| a.name.as_str()))
            .abstract_text(abstract_text)
            .year(year)
            .url(entry.id.clone())
            .build()
    }
}

#[async_trait]
impl Source for ArxivSource {
    fn id(&self) -> &str {
        "arxiv"
    }

    fn name(&self) -> &str {
        "arXiv"
    }

    async fn search(
        &self,
        params: &SearchParams,
        max_results: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        let (search_query, sort_by) = match Self::build_query(params) {
            Some(query) => (query, "relevance"),
            None => {
                tracing::info!("No search terms given, fetching the latest arXiv uploads");
                (LATEST_QUERY.to_string(), "submittedDate")
            }
        };

        let max_results = max_results.to_string();
        let request = self
            .client
            .get(&self.api_url)
            .header("Accept", "application/atom+xml")
            .query(&[
                ("search_query", search_query.as_str()),
                ("start", "0"),
                ("max_results", max_results.as_str()),
                ("sortBy", sort_by),
                ("sortOrder", "descending"),
            ]);

        let body = get_text(request, "arXiv").await?;
        Self::parse_feed(body.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::models::NOT_AVAILABLE;
    use mockito::Matcher;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>arXiv Query Results</title>
  <id>http://arxiv.org/api/query</id>
  <updated>2023-01-16T00:00:00-05:00</updated>
  <entry>
    <id>http://arxiv.org/abs/2301.12345v1</id>
    <updated>2023-01-16T10:00:00Z</updated>
    <published>2023-01-15T10:00:00Z</published>
    <title>Attention Is
      Still All You Need</title>
    <summary>
  We revisit attention.
    </summary>
    <author><name>Ada Lovelace</name></author>
    <author><name>Alan Turing</name></author>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2301.54321v2</id>
    <updated>2023-01-16T10:00:00Z</updated>
    <title>Untimed</title>
  </entry>
</feed>"#;

    #[test]
    fn test_build_query() {
        let params = SearchParams::new("neural networks")
            .author("Hinton")
            .journal("ignored")
            .year("2020");
        assert_eq!(
            ArxivSource::build_query(&params).unwrap(),
            "all:neural networks Hinton 2020"
        );

        let author_only = SearchParams::default().author(" LeCun ");
        assert_eq!(ArxivSource::build_query(&author_only).unwrap(), "all:LeCun");

        assert!(ArxivSource::build_query(&SearchParams::default().journal("Nature")).is_none());
    }

    #[test]
    fn test_parse_feed() {
        let papers = ArxivSource::parse_feed(FEED.as_bytes()).unwrap();
        assert_eq!(papers.len(), 2);

        let first = &papers[0];
        assert_eq!(first.title, "Attention Is Still All You Need");
        assert_eq!(first.authors, "Ada Lovelace, Alan Turing");
        assert_eq!(first.r#abstract, "We revisit attention.");
        assert_eq!(first.year, "2023");
        assert_eq!(first.url, "http://arxiv.org/abs/2301.12345v1");
        assert_eq!(first.doi, NOT_AVAILABLE);

        let second = &papers[1];
        assert_eq!(second.year, NOT_AVAILABLE);
        assert_eq!(second.authors, NOT_AVAILABLE);
        assert_eq!(second.r#abstract, NOT_AVAILABLE);
    }

    #[test]
    fn test_year_comes_from_published_date() {
        let feed = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>arXiv Query Results</title>
  <id>http://arxiv.org/api/query</id>
  <updated>2024-03-01T00:00:00Z</updated>
  <entry>
    <id>http://arxiv.org/abs/0906.00001v3</id>
    <updated>2024-03-01T00:00:00Z</updated>
    <published>2009-06-01T12:00:00Z</published>
    <title>Revised many times</title>
  </entry>
</feed>"#;

        let papers = ArxivSource::parse_feed(feed.as_bytes()).unwrap();
        assert_eq!(papers[0].year, "2009");
    }

    #[tokio::test]
    async fn test_search_sends_free_text_query() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("search_query".into(), "all:quantum Preskill".into()),
                Matcher::UrlEncoded("max_results".into(), "3".into()),
                Matcher::UrlEncoded("sortBy".into(), "relevance".into()),
            ]))
            .with_status(200)
            .with_body(FEED)
            .create_async()
            .await;

        let client = Arc::new(HttpClient::new(&HttpConfig::default()).unwrap());
        let source = ArxivSource::with_api_url(client, format!("{}/api/query", server.url()));
        let papers = source
            .search(&SearchParams::new("quantum").author("Preskill"), 3)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(papers.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_params_fetch_latest() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("search_query".into(), "all:*".into()),
                Matcher::UrlEncoded("sortBy".into(), "submittedDate".into()),
            ]))
            .with_status(200)
            .with_body(FEED)
            .create_async()
            .await;

        let client = Arc::new(HttpClient::new(&HttpConfig::default()).unwrap());
        let source = ArxivSource::with_api_url(client, format!("{}/api/query", server.url()));
        let papers = source.search(&SearchParams::default(), 10).await.unwrap();

        mock.assert_async().await;
        assert_eq!(papers.len(), 2);
    }

    #[tokio::test]
    async fn test_http_error_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/query")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let client = Arc::new(HttpClient::new(&HttpConfig::default()).unwrap());
        let source = ArxivSource::with_api_url(client, format!("{}/api/query", server.url()));

        assert!(matches!(
            source.search(&SearchParams::new("x"), 1).await,
            Err(SourceError::Api(_))
        ));
    }
}
