//! CrossRef source implementation.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{PaperBuilder, PaperRecord, SearchParams};
use crate::sources::{IssnLookup, Source, SourceCapabilities, SourceError};
use crate::utils::{get_text, HttpClient};

const CROSSREF_API_BASE: &str = "https://api.crossref.org";

/// CrossRef source
///
/// Uses the CrossRef REST API for bibliographic search and per-DOI lookups.
/// The per-DOI lookup doubles as the ISSN enrichment backend for Google Scholar.
#[derive(Debug, Clone)]
pub struct CrossRefSource {
    client: Arc<HttpClient>,
    base_url: String,
}

impl CrossRefSource {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self::with_base_url(client, CROSSREF_API_BASE)
    }

    /// Create with a custom API base URL (for testing)
    pub fn with_base_url(client: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build the free-text `query` from keyword and author; `None` when both are blank.
    pub fn build_query(params: &SearchParams) -> Option<String> {
        let terms: Vec<&str> = [params.keyword_term(), params.author_term()]
            .into_iter()
            .flatten()
            .collect();

        (!terms.is_empty()).then(|| terms.join(" "))
    }

    fn with_mailto(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.client.mailto() {
            Some(mailto) => request.query(&[("mailto", mailto)]),
            None => request,
        }
    }

    /// Parse a `/works` search response
    pub fn parse_search_response(json: &str) -> Result<Vec<PaperRecord>, SourceError> {
        let response: CRListResponse = serde_json::from_str(json)
            .map_err(|e| SourceError::Parse(format!("Failed to parse CrossRef JSON: {}", e)))?;

        Ok(response.message.items.into_iter().map(CRItem::into_record).collect())
    }

    async fn fetch_work(&self, doi: &str) -> Result<CRItem, SourceError> {
        let url = format!("{}/works/{}", self.base_url, urlencoding::encode(doi));
        let request = self.with_mailto(self.client.get(&url));

        let json = get_text(request, "CrossRef DOI lookup").await?;
        let response: CRWorkResponse = serde_json::from_str(&json)
            .map_err(|e| SourceError::Parse(format!("Failed to parse CrossRef JSON: {}", e)))?;

        Ok(response.message)
    }

    /// Get a paper by its DOI
    pub async fn get_by_doi(&self, doi: &str) -> Result<PaperRecord, SourceError> {
        Ok(self.fetch_work(doi).await?.into_record())
    }
}

#[async_trait]
impl Source for CrossRefSource {
    fn id(&self) -> &str {
        "crossref"
    }

    fn name(&self) -> &str {
        "CrossRef"
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::DOI_LOOKUP
    }

    async fn search(
        &self,
        params: &SearchParams,
        max_results: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        let Some(query) = Self::build_query(params) else {
            tracing::warn!("No CrossRef search terms given, returning empty result");
            return Ok(Vec::new());
        };

        let rows = max_results.to_string();
        let request = self
            .client
            .get(&format!("{}/works", self.base_url))
            .query(&[("query", query.as_str()), ("rows", rows.as_str())]);

        let json = get_text(self.with_mailto(request), "CrossRef").await?;
        let mut papers = Self::parse_search_response(&json)?;
        papers.truncate(max_results);
        Ok(papers)
    }
}

#[async_trait]
impl IssnLookup for CrossRefSource {
    async fn issns_for_doi(&self, doi: &str) -> Result<Vec<String>, SourceError> {
        Ok(self.fetch_work(doi).await?.issn)
    }
}

// ===== CrossRef API Types =====

#[derive(Debug, Deserialize)]
struct CRListResponse {
    message: CRMessage,
}

#[derive(Debug, Deserialize)]
struct CRWorkResponse {
    message: CRItem,
}

#[derive(Debug, Deserialize)]
struct CRMessage {
    #[serde(default)]
    items: Vec<CRItem>,
}

#[derive(Debug, Deserialize)]
struct CRAuthor {
    given: Option<String>,
    family: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CRDate {
    #[serde(rename = "date-parts", default)]
    date_parts: Vec<Vec<Option<i64>>>,
}

#[derive(Debug, Deserialize)]
struct CRItem {
    #[serde(default)]
    title: Vec<String>,
    author: Option<Vec<CRAuthor>>,
    created: Option<CRDate>,
    #[serde(rename = "DOI")]
    doi: Option<String>,
    #[serde(rename = "container-title", default)]
    container_title: Vec<String>,
    #[serde(rename = "ISSN", default)]
    issn: Vec<String>,
    #[serde(rename = "URL")]
    url: Option<String>,
    volume: Option<String>,
    issue: Option<String>,
    page: Option<String>,
    publisher: Option<String>,
}

impl CRItem {
    fn into_record(self) -> PaperRecord {
        let authors: Vec<String> = self
            .author
            .unwrap_or_default()
            .into_iter()
            .map(|a| {
                format!(
                    "{} {}",
                    a.given.as_deref().unwrap_or(crate::models::NOT_AVAILABLE),
                    a.family.as_deref().unwrap_or(crate::models::NOT_AVAILABLE)
                )
            })
            .collect();

        let year = self
            .created
            .as_ref()
            .and_then(|c| c.date_parts.first())
            .and_then(|parts| parts.first().copied().flatten())
            .map(|y| y.to_string())
            .unwrap_or_default();

        PaperBuilder::new(self.title.into_iter().next().unwrap_or_default())
            .authors(authors)
            .year(year)
            .journal(self.container_title.into_iter().next().unwrap_or_default())
            .volume(self.volume.unwrap_or_default())
            .issue_number(self.issue.unwrap_or_default())
            .pages(self.page.unwrap_or_default())
            .publisher(self.publisher.unwrap_or_default())
            .issns(self.issn)
            .doi(self.doi.unwrap_or_default())
            .url(self.url.unwrap_or_default())
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::models::NOT_AVAILABLE;
    use mockito::Matcher;

    const SEARCH_BODY: &str = r#"{
      "status": "ok",
      "message": {
        "total-results": 2,
        "items": [
          {
            "title": ["Deep learning"],
            "author": [
              {"given": "Yann", "family": "LeCun"},
              {"family": "Bengio"}
            ],
            "created": {"date-parts": [[2015, 5, 27]]},
            "DOI": "10.1038/nature14539",
            "container-title": ["Nature"],
            "ISSN": ["0028-0836", "1476-4687"],
            "URL": "http://dx.doi.org/10.1038/nature14539",
            "volume": "521",
            "issue": "7553",
            "page": "436-444",
            "publisher": "Springer Science and Business Media LLC"
          },
          {
            "DOI": "10.5555/bare"
          }
        ]
      }
    }"#;

    fn client() -> Arc<HttpClient> {
        Arc::new(HttpClient::new(&HttpConfig::default()).unwrap())
    }

    #[test]
    fn test_build_query() {
        let params = SearchParams::new("deep learning")
            .author("LeCun")
            .journal("Nature")
            .year("2015");
        assert_eq!(
            CrossRefSource::build_query(&params).unwrap(),
            "deep learning LeCun"
        );
        assert_eq!(
            CrossRefSource::build_query(&SearchParams::default().author("LeCun")).unwrap(),
            "LeCun"
        );
        assert!(CrossRefSource::build_query(&SearchParams::default().year("2015")).is_none());
    }

    #[test]
    fn test_parse_search_response() {
        let papers = CrossRefSource::parse_search_response(SEARCH_BODY).unwrap();
        assert_eq!(papers.len(), 2);

        let full = &papers[0];
        assert_eq!(full.title, "Deep learning");
        assert_eq!(full.authors, "Yann LeCun, N/A Bengio");
        assert_eq!(full.year, "2015");
        assert_eq!(full.journal, "Nature");
        assert_eq!(full.issn, "0028-0836, 1476-4687");
        assert_eq!(full.doi, "10.1038/nature14539");
        assert_eq!(full.url, "http://dx.doi.org/10.1038/nature14539");
        assert_eq!(full.volume, "521");
        assert_eq!(full.issue_number, "7553");
        assert_eq!(full.pages, "436-444");

        let bare = &papers[1];
        assert_eq!(bare.title, NOT_AVAILABLE);
        assert_eq!(bare.authors, NOT_AVAILABLE);
        assert_eq!(bare.year, NOT_AVAILABLE);
        assert_eq!(bare.issn, NOT_AVAILABLE);
        assert_eq!(bare.doi, "10.5555/bare");
    }

    #[tokio::test]
    async fn test_search() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/works")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "deep learning LeCun".into()),
                Matcher::UrlEncoded("rows".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body(SEARCH_BODY)
            .create_async()
            .await;

        let source = CrossRefSource::with_base_url(client(), server.url());
        let papers = source
            .search(&SearchParams::new("deep learning").author("LeCun"), 1)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(papers.len(), 1);
        assert_eq!(papers[0].doi(), Some("10.1038/nature14539"));
    }

    #[tokio::test]
    async fn test_issn_lookup() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/works/10.1038%2Fnature14539")
            .with_status(200)
            .with_body(r#"{"message": {"DOI": "10.1038/nature14539", "ISSN": ["0028-0836"]}}"#)
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/works/10.0%2Fmissing")
            .with_status(404)
            .create_async()
            .await;

        let source = CrossRefSource::with_base_url(client(), server.url());

        assert_eq!(
            source.issns_for_doi("10.1038/nature14539").await.unwrap(),
            vec!["0028-0836".to_string()]
        );
        assert!(source.issns_for_doi("10.0/missing").await.is_err());

        let paper = source.get_by_doi("10.1038/nature14539").await.unwrap();
        assert_eq!(paper.issn, "0028-0836");
    }
}
