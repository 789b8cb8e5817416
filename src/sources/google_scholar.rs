//! Google Scholar source implementation.
//!
//! Google Scholar has no official API. Results come from a [`ScholarBackend`],
//! by default [`ScholarScraper`], which parses the public result page. The
//! page is rate-limited and often blocked, so the whole retrieval (search,
//! truncation and per-hit fill) runs under a [`BackoffPolicy`]. Each record
//! that carries a DOI is then enriched with ISSNs from an [`IssnLookup`].

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::{Arc, OnceLock};

use crate::models::{CitationCount, PaperBuilder, PaperRecord, SearchParams};
use crate::sources::{enrich_issn, IssnLookup, Source, SourceError};
use crate::utils::{get_text, with_backoff, BackoffPolicy, HttpClient, RetryResult};

const GOOGLE_SCHOLAR_URL: &str = "https://scholar.google.com";

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// One search hit as returned by a [`ScholarBackend`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScholarHit {
    pub title: String,
    pub authors: Vec<String>,
    pub venue: String,
    pub year: String,
    pub abstract_text: String,
    pub citation_count: Option<u64>,
    pub doi: Option<String>,
    /// Landing page of the publication
    pub url: Option<String>,
    /// Direct full-text link, when Scholar shows one
    pub eprint_url: Option<String>,
}

impl ScholarHit {
    /// Normalize into a record. The full-text link is preferred as `url`.
    pub fn into_record(self) -> PaperRecord {
        let citation_count = self
            .citation_count
            .map(CitationCount::Count)
            .unwrap_or_default();

        PaperBuilder::new(self.title)
            .authors(self.authors)
            .abstract_text(self.abstract_text)
            .year(self.year)
            .journal(self.venue)
            .citation_count(citation_count)
            .doi(self.doi.unwrap_or_default())
            .url(self.eprint_url.or(self.url).unwrap_or_default())
            .build()
    }
}

/// Search-and-fill access to Google Scholar.
#[async_trait]
pub trait ScholarBackend: Send + Sync + std::fmt::Debug {
    /// Run a query and return the hits in rank order.
    async fn search(&self, query: &str) -> Result<Vec<ScholarHit>, SourceError>;

    /// Complete the bibliographic fields of a hit.
    async fn fill(&self, hit: ScholarHit) -> Result<ScholarHit, SourceError> {
        Ok(hit)
    }
}

/// Default backend: scrapes the Scholar result page.
#[derive(Debug, Clone)]
pub struct ScholarScraper {
    client: Arc<HttpClient>,
    base_url: String,
}

impl ScholarScraper {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self::with_base_url(client, GOOGLE_SCHOLAR_URL)
    }

    /// Create with a custom base URL (for testing)
    pub fn with_base_url(client: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Parse a result page into hits.
    ///
    /// A page that is a robot check rather than results is an error, so the
    /// retry policy gets a chance to wait it out.
    pub fn parse_results(html: &str) -> Result<Vec<ScholarHit>, SourceError> {
        let document = Html::parse_document(html);
        let captcha_selector = selector("#gs_captcha_f, form#captcha-form")?;
        if document.select(&captcha_selector).next().is_some() {
            return Err(SourceError::Api(
                "Google Scholar served a robot check".to_string(),
            ));
        }

        let result_selector = selector("div.gs_r")?;
        let body_selector = selector("div.gs_ri")?;
        let eprint_selector = selector("div.gs_ggs a")?;
        let title_selector = selector("h3.gs_rt")?;
        let link_selector = selector("h3.gs_rt a")?;
        let byline_selector = selector("div.gs_a")?;
        let snippet_selector = selector("div.gs_rs")?;
        let footer_link_selector = selector("div.gs_fl a")?;

        let mut hits = Vec::new();
        for result in document.select(&result_selector) {
            let Some(body) = result.select(&body_selector).next() else {
                continue;
            };

            let title = body
                .select(&link_selector)
                .next()
                .or_else(|| body.select(&title_selector).next())
                .map(|e| strip_title_tags(&element_text(e)))
                .unwrap_or_default();
            if title.is_empty() {
                continue;
            }

            let url = body
                .select(&link_selector)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string);
            let eprint_url = result
                .select(&eprint_selector)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(str::to_string);

            let (authors, venue, year) = body
                .select(&byline_selector)
                .next()
                .map(|e| parse_byline(&element_text(e)))
                .unwrap_or_default();

            let abstract_text = body
                .select(&snippet_selector)
                .next()
                .map(element_text)
                .unwrap_or_default();

            let citation_count = body
                .select(&footer_link_selector)
                .filter_map(|a| {
                    element_text(a)
                        .strip_prefix("Cited by ")
                        .and_then(|n| n.trim().parse().ok())
                })
                .next();

            let doi = [url.as_deref(), eprint_url.as_deref()]
                .into_iter()
                .flatten()
                .find_map(extract_doi);

            hits.push(ScholarHit {
                title,
                authors,
                venue,
                year,
                abstract_text,
                citation_count,
                doi,
                url,
                eprint_url,
            });
        }

        Ok(hits)
    }
}

#[async_trait]
impl ScholarBackend for ScholarScraper {
    async fn search(&self, query: &str) -> Result<Vec<ScholarHit>, SourceError> {
        let request = self
            .client
            .get(&format!("{}/scholar", self.base_url))
            .header("User-Agent", BROWSER_USER_AGENT)
            .query(&[("hl", "en"), ("q", query)]);

        let html = get_text(request, "Google Scholar").await?;
        Self::parse_results(&html)
    }
}

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Parse(format!("Bad selector {}: {}", css, e)))
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop leading markers such as `[PDF]` or `[HTML]`.
fn strip_title_tags(title: &str) -> String {
    let mut rest = title.trim();
    while let Some(stripped) = rest.strip_prefix('[') {
        match stripped.find(']') {
            Some(end) => rest = stripped[end + 1..].trim_start(),
            None => break,
        }
    }
    rest.to_string()
}

fn year_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(1[5-9]\d{2}|20\d{2})\b").ok())
        .as_ref()
}

fn doi_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"10\.\d{4,9}/[^\s"?#&]+"#).ok())
        .as_ref()
}

fn extract_doi(link: &str) -> Option<String> {
    let decoded = urlencoding::decode(link)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| link.to_string());

    doi_regex()?
        .find(&decoded)
        .map(|m| m.as_str().trim_end_matches(['.', '/']).to_string())
}

/// Split the green byline, `A Author, B Author - Venue, 2020 - host.org`,
/// into authors, venue and year.
fn parse_byline(byline: &str) -> (Vec<String>, String, String) {
    let byline = byline.replace('\u{a0}', " ");
    let mut parts = byline.split(" - ");

    let authors = parts
        .next()
        .unwrap_or_default()
        .split(',')
        .map(|a| a.trim().trim_matches('…').trim())
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();

    let source = parts.next().unwrap_or_default();
    let year_match = year_regex().and_then(|re| re.find_iter(source).last());

    let (venue, year) = match year_match {
        Some(m) => (
            format!("{}{}", &source[..m.start()], &source[m.end()..]),
            m.as_str().to_string(),
        ),
        None => (source.to_string(), String::new()),
    };

    let venue = venue
        .trim()
        .trim_matches(|c: char| c == ',' || c == '…' || c.is_whitespace())
        .to_string();

    (authors, venue, year)
}

/// Google Scholar source
#[derive(Debug, Clone)]
pub struct GoogleScholarSource {
    backend: Arc<dyn ScholarBackend>,
    issn_lookup: Arc<dyn IssnLookup>,
    policy: BackoffPolicy,
}

impl GoogleScholarSource {
    /// Create a source backed by the page scraper.
    pub fn new(
        client: Arc<HttpClient>,
        issn_lookup: Arc<dyn IssnLookup>,
        policy: BackoffPolicy,
    ) -> Self {
        Self::with_backend(Arc::new(ScholarScraper::new(client)), issn_lookup, policy)
    }

    pub fn with_backend(
        backend: Arc<dyn ScholarBackend>,
        issn_lookup: Arc<dyn IssnLookup>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            backend,
            issn_lookup,
            policy,
        }
    }

    /// Build `keyword author:X year:Y`, leaving out blank parts.
    pub fn build_query(params: &SearchParams) -> Option<String> {
        let author = params.author_term().map(|a| format!("author:{}", a));
        let year = params.year_term().map(|y| format!("year:{}", y));

        let terms: Vec<String> = [params.keyword_term().map(str::to_string), author, year]
            .into_iter()
            .flatten()
            .collect();

        (!terms.is_empty()).then(|| terms.join(" "))
    }
}

#[async_trait]
impl Source for GoogleScholarSource {
    fn id(&self) -> &str {
        "google_scholar"
    }

    fn name(&self) -> &str {
        "Google Scholar"
    }

    async fn search(
        &self,
        params: &SearchParams,
        max_results: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        let Some(query) = Self::build_query(params) else {
            tracing::warn!("Invalid Google Scholar query, returning empty result");
            return Ok(Vec::new());
        };

        let query = query.as_str();
        let backend = self.backend.as_ref();

        let outcome = with_backoff(self.policy, || async move {
            let mut hits = backend.search(query).await?;
            hits.truncate(max_results);

            let mut filled = Vec::with_capacity(hits.len());
            for hit in hits {
                filled.push(backend.fill(hit).await?);
            }
            Ok::<_, SourceError>(filled)
        })
        .await;

        let hits = match outcome {
            RetryResult::Success { value, .. } => value,
            RetryResult::Exhausted { attempts, .. } => {
                tracing::error!(
                    "Google Scholar search failed after {} attempts, returning empty result",
                    attempts
                );
                return Ok(Vec::new());
            }
        };

        let mut records = Vec::with_capacity(hits.len());
        for hit in hits {
            records.push(enrich_issn(hit.into_record(), self.issn_lookup.as_ref()).await);
        }
        Ok(records)
    }
}
