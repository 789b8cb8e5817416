//! PubMed source implementation using E-utilities API.
//!
//! Retrieval is two-phase: `esearch` returns up to `max_results` PMIDs, then
//! each PMID is fetched on its own with `efetch`. A failed detail fetch
//! degrades to an all-`N/A` record instead of aborting the batch.

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;
use std::sync::Arc;

use crate::models::{PaperBuilder, PaperRecord, SearchParams, NOT_AVAILABLE};
use crate::sources::{Source, SourceError};
use crate::utils::{get_text, HttpClient};

/// PubMed E-utilities API base URL
const PUBMED_EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// PubMed source
#[derive(Debug, Clone)]
pub struct PubMedSource {
    client: Arc<HttpClient>,
    base_url: String,
}

impl PubMedSource {
    /// Create a new PubMed source
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self::with_base_url(client, PUBMED_EUTILS_BASE)
    }

    /// Create with a custom E-utilities base URL (for testing)
    pub fn with_base_url(client: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build the field-qualified `term` for esearch.
    ///
    /// Returns `None` when no search term is set.
    pub fn build_query(params: &SearchParams) -> Option<String> {
        let clauses: Vec<String> = [
            (params.keyword_term(), "Title/Abstract"),
            (params.author_term(), "Author"),
            (params.journal_term(), "Journal"),
            (params.year_term(), "Publication Date"),
        ]
        .into_iter()
        .filter_map(|(value, field)| value.map(|v| format!("{}[{}]", v, field)))
        .collect();

        (!clauses.is_empty()).then(|| clauses.join(" AND "))
    }

    /// Parse the esearch JSON response into PMIDs
    fn parse_search_response(json: &str) -> Result<Vec<String>, SourceError> {
        #[derive(Debug, Deserialize)]
        struct ESearchResponse {
            #[serde(default)]
            esearchresult: ESearchResult,
        }

        #[derive(Debug, Default, Deserialize)]
        struct ESearchResult {
            #[serde(default)]
            idlist: Vec<String>,
        }

        let response: ESearchResponse = serde_json::from_str(json)
            .map_err(|e| SourceError::Parse(format!("Failed to parse PubMed search JSON: {}", e)))?;

        Ok(response.esearchresult.idlist)
    }

    async fn search_ids(&self, term: &str, max_results: usize) -> Result<Vec<String>, SourceError> {
        let retmax = max_results.to_string();
        let request = self.client.get(&format!("{}/esearch.fcgi", self.base_url)).query(&[
            ("db", "pubmed"),
            ("term", term),
            ("retmax", retmax.as_str()),
            ("retmode", "json"),
        ]);

        let json = get_text(request, "PubMed search").await?;
        let mut ids = Self::parse_search_response(&json)?;
        ids.truncate(max_results);
        Ok(ids)
    }

    /// Fetch and parse the details of one article
    async fn fetch_article(&self, article_id: &str) -> Result<PaperRecord, SourceError> {
        let request = self.client.get(&format!("{}/efetch.fcgi", self.base_url)).query(&[
            ("db", "pubmed"),
            ("id", article_id),
            ("retmode", "xml"),
        ]);

        let xml = get_text(request, "PubMed article details").await?;
        Self::parse_article(&xml)
    }

    /// Parse an efetch XML document into a record.
    ///
    /// Fields are located the way an XPath descendant search would find them;
    /// the first match wins and anything absent is `N/A`.
    pub fn parse_article(xml: &str) -> Result<PaperRecord, SourceError> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<String> = Vec::new();
        let mut fields = ArticleFields::default();
        let mut capture: Option<Capture> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                SourceError::Parse(format!("Failed to parse PubMed article XML: {}", e))
            })?;

            match event {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    stack.push(name);

                    if stack.last().map(String::as_str) == Some("Author") {
                        fields.authors.push(AuthorParts::default());
                    }

                    if capture.is_none() {
                        if let Some(target) = classify(&stack, &e, &fields)? {
                            capture = Some(Capture {
                                target,
                                depth: stack.len(),
                                text: String::new(),
                            });
                        }
                    }
                }
                Event::Empty(e) => {
                    if e.local_name().as_ref() == b"Author" {
                        fields.authors.push(AuthorParts::default());
                    }
                }
                Event::Text(t) => {
                    if let Some(capture) = capture.as_mut() {
                        let text = t.unescape().map_err(|e| {
                            SourceError::Parse(format!("Bad text in PubMed XML: {}", e))
                        })?;
                        capture.text.push_str(&text);
                    }
                }
                Event::CData(t) => {
                    if let Some(capture) = capture.as_mut() {
                        capture.text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                    }
                }
                Event::End(_) => {
                    if capture.as_ref().is_some_and(|c| c.depth == stack.len()) {
                        if let Some(done) = capture.take() {
                            fields.apply(done);
                        }
                    }
                    stack.pop();
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(fields.into_record())
    }
}

/// Which value the text of the current element feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Title,
    Abstract,
    Year,
    Journal,
    Volume,
    Issue,
    Pages,
    Publisher,
    Doi,
    Pmid,
    ForeName,
    LastName,
    CollectiveName,
}

#[derive(Debug)]
struct Capture {
    target: Target,
    depth: usize,
    text: String,
}

#[derive(Debug, Default)]
struct AuthorParts {
    fore_name: Option<String>,
    last_name: Option<String>,
    collective_name: Option<String>,
}

impl AuthorParts {
    fn display_name(&self) -> String {
        if let (None, None, Some(collective)) =
            (&self.fore_name, &self.last_name, &self.collective_name)
        {
            return collective.clone();
        }
        format!(
            "{} {}",
            self.fore_name.as_deref().unwrap_or(NOT_AVAILABLE),
            self.last_name.as_deref().unwrap_or(NOT_AVAILABLE)
        )
    }
}

#[derive(Debug, Default)]
struct ArticleFields {
    title: Option<String>,
    abstract_text: Option<String>,
    year: Option<String>,
    journal: Option<String>,
    volume: Option<String>,
    issue: Option<String>,
    pages: Option<String>,
    publisher: Option<String>,
    doi: Option<String>,
    pmid: Option<String>,
    authors: Vec<AuthorParts>,
}

impl ArticleFields {
    fn slot(&mut self, target: Target) -> Option<&mut Option<String>> {
        match target {
            Target::Title => Some(&mut self.title),
            Target::Abstract => Some(&mut self.abstract_text),
            Target::Year => Some(&mut self.year),
            Target::Journal => Some(&mut self.journal),
            Target::Volume => Some(&mut self.volume),
            Target::Issue => Some(&mut self.issue),
            Target::Pages => Some(&mut self.pages),
            Target::Publisher => Some(&mut self.publisher),
            Target::Doi => Some(&mut self.doi),
            Target::Pmid => Some(&mut self.pmid),
            Target::ForeName | Target::LastName | Target::CollectiveName => None,
        }
    }

    fn is_filled(&self, target: Target) -> bool {
        match target {
            Target::Title => self.title.is_some(),
            Target::Abstract => self.abstract_text.is_some(),
            Target::Year => self.year.is_some(),
            Target::Journal => self.journal.is_some(),
            Target::Volume => self.volume.is_some(),
            Target::Issue => self.issue.is_some(),
            Target::Pages => self.pages.is_some(),
            Target::Publisher => self.publisher.is_some(),
            Target::Doi => self.doi.is_some(),
            Target::Pmid => self.pmid.is_some(),
            Target::ForeName | Target::LastName | Target::CollectiveName => false,
        }
    }

    fn apply(&mut self, capture: Capture) {
        let text = capture.text.split_whitespace().collect::<Vec<_>>().join(" ");

        if let Some(slot) = self.slot(capture.target) {
            *slot = Some(text);
            return;
        }

        let Some(author) = self.authors.last_mut() else {
            return;
        };
        let value = (!text.is_empty()).then_some(text);
        match capture.target {
            Target::ForeName => author.fore_name = value,
            Target::LastName => author.last_name = value,
            Target::CollectiveName => author.collective_name = value,
            _ => {}
        }
    }

    fn into_record(self) -> PaperRecord {
        let authors: Vec<String> = self.authors.iter().map(AuthorParts::display_name).collect();

        PaperBuilder::new(self.title.unwrap_or_default())
            .authors(authors)
            .abstract_text(self.abstract_text.unwrap_or_default())
            .year(self.year.unwrap_or_default())
            .journal(self.journal.unwrap_or_default())
            .volume(self.volume.unwrap_or_default())
            .issue_number(self.issue.unwrap_or_default())
            .pages(self.pages.unwrap_or_default())
            .publisher(self.publisher.unwrap_or_default())
            .doi(self.doi.unwrap_or_default())
            .url(self.pmid.unwrap_or_default())
            .build()
    }
}

fn attribute_is(element: &BytesStart<'_>, key: &str, expected: &str) -> Result<bool, SourceError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| SourceError::Parse(format!("Bad attribute: {}", e)))?;
        if attr.key.local_name().as_ref() == key.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| SourceError::Parse(format!("Bad attribute value: {}", e)))?;
            return Ok(value.eq_ignore_ascii_case(expected));
        }
    }
    Ok(false)
}

/// Decide whether the element just opened (last entry of `stack`) is one we read.
fn classify(
    stack: &[String],
    element: &BytesStart<'_>,
    fields: &ArticleFields,
) -> Result<Option<Target>, SourceError> {
    let Some((name, ancestors)) = stack.split_last() else {
        return Ok(None);
    };
    let parent = ancestors.last().map(String::as_str);
    let in_journal = ancestors.iter().any(|a| a == "Journal");

    let target = match (name.as_str(), parent) {
        ("ArticleTitle", _) => Target::Title,
        ("AbstractText", Some("Abstract")) => Target::Abstract,
        ("Year", Some("PubDate")) => Target::Year,
        ("Title", Some("Journal")) => Target::Journal,
        ("Volume", _) if in_journal => Target::Volume,
        ("Issue", _) if in_journal => Target::Issue,
        ("MedlinePgn", Some("Pagination")) => Target::Pages,
        ("PublisherName", _) => Target::Publisher,
        ("ELocationID", _) if attribute_is(element, "EIdType", "doi")? => Target::Doi,
        ("ArticleId", _) if attribute_is(element, "IdType", "pubmed")? => Target::Pmid,
        ("ForeName", Some("Author")) => Target::ForeName,
        ("LastName", Some("Author")) => Target::LastName,
        ("CollectiveName", Some("Author")) => Target::CollectiveName,
        _ => return Ok(None),
    };

    if fields.is_filled(target) {
        return Ok(None);
    }
    Ok(Some(target))
}

#[async_trait]
impl Source for PubMedSource {
    fn id(&self) -> &str {
        "pubmed"
    }

    fn name(&self) -> &str {
        "PubMed"
    }

    async fn search(
        &self,
        params: &SearchParams,
        max_results: usize,
    ) -> Result<Vec<PaperRecord>, SourceError> {
        let Some(term) = Self::build_query(params) else {
            tracing::warn!("No PubMed search terms given, returning empty result");
            return Ok(Vec::new());
        };

        tracing::debug!("PubMed term: {}", term);
        let ids = self.search_ids(&term, max_results).await?;
        tracing::debug!("PubMed returned {} ids", ids.len());

        let mut papers = Vec::with_capacity(ids.len());
        for article_id in &ids {
            match self.fetch_article(article_id).await {
                Ok(paper) => papers.push(paper),
                Err(e) => {
                    tracing::error!("Error fetching article details for ID {}: {}", article_id, e);
                    papers.push(PaperRecord::default());
                }
            }
        }

        Ok(papers)
    }
}
