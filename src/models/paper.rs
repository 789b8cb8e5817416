//! Paper record: the normalized shape every source maps into.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Sentinel stored in place of any field a source could not supply.
pub const NOT_AVAILABLE: &str = "N/A";

fn not_available() -> String {
    NOT_AVAILABLE.to_string()
}

/// Returns `true` when a field holds a usable value (non-empty, not the sentinel).
pub fn is_available(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && value != NOT_AVAILABLE
}

/// Citation count as reported by the scholarly-search source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CitationCount {
    Count(u64),
    #[default]
    NotAvailable,
}

impl Serialize for CitationCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CitationCount::Count(n) => serializer.serialize_u64(*n),
            CitationCount::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
        }
    }
}

impl<'de> Deserialize<'de> for CitationCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::Number(n) => n
                .as_u64()
                .map(CitationCount::Count)
                .unwrap_or(CitationCount::NotAvailable),
            serde_json::Value::String(s) => s
                .trim()
                .parse()
                .map(CitationCount::Count)
                .unwrap_or(CitationCount::NotAvailable),
            _ => CitationCount::NotAvailable,
        })
    }
}

/// Accepts strings, numbers or null; older stores wrote CrossRef years as integers.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        _ => not_available(),
    })
}

/// A bibliographic record from any source.
///
/// Every field is always serialized. Fields a source does not provide hold
/// [`NOT_AVAILABLE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperRecord {
    #[serde(default = "not_available", deserialize_with = "lenient_string")]
    pub title: String,

    /// Display names joined with `", "`
    #[serde(
        default = "not_available",
        alias = "author",
        deserialize_with = "lenient_string"
    )]
    pub authors: String,

    #[serde(default = "not_available", deserialize_with = "lenient_string")]
    pub r#abstract: String,

    #[serde(default = "not_available", deserialize_with = "lenient_string")]
    pub year: String,

    #[serde(default = "not_available", deserialize_with = "lenient_string")]
    pub journal: String,

    #[serde(default = "not_available", deserialize_with = "lenient_string")]
    pub volume: String,

    #[serde(
        default = "not_available",
        alias = "number",
        deserialize_with = "lenient_string"
    )]
    pub issue_number: String,

    #[serde(default = "not_available", deserialize_with = "lenient_string")]
    pub pages: String,

    #[serde(default = "not_available", deserialize_with = "lenient_string")]
    pub publisher: String,

    /// Comma-joined ISSN list
    #[serde(default = "not_available", deserialize_with = "lenient_string")]
    pub issn: String,

    #[serde(default)]
    pub citation_count: CitationCount,

    #[serde(default = "not_available", deserialize_with = "lenient_string")]
    pub doi: String,

    #[serde(default = "not_available", deserialize_with = "lenient_string")]
    pub url: String,
}

impl Default for PaperRecord {
    fn default() -> Self {
        Self {
            title: not_available(),
            authors: not_available(),
            r#abstract: not_available(),
            year: not_available(),
            journal: not_available(),
            volume: not_available(),
            issue_number: not_available(),
            pages: not_available(),
            publisher: not_available(),
            issn: not_available(),
            citation_count: CitationCount::NotAvailable,
            doi: not_available(),
            url: not_available(),
        }
    }
}

impl PaperRecord {
    /// DOI if available
    pub fn doi(&self) -> Option<&str> {
        is_available(&self.doi).then_some(self.doi.as_str())
    }

    /// URL if available
    pub fn url(&self) -> Option<&str> {
        is_available(&self.url).then_some(self.url.as_str())
    }

    /// Key used for deduplication: DOI, falling back to URL.
    pub fn dedup_key(&self) -> Option<&str> {
        self.doi().or_else(|| self.url())
    }
}

/// Turns an optional, possibly blank value into a field value.
fn field(value: impl Into<String>) -> String {
    let value = value.into();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        not_available()
    } else {
        trimmed.to_string()
    }
}

/// Builder for constructing [`PaperRecord`]s
///
/// Blank values are stored as [`NOT_AVAILABLE`].
#[derive(Debug, Clone, Default)]
pub struct PaperBuilder {
    paper: PaperRecord,
}

impl PaperBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        let mut paper = PaperRecord::default();
        paper.title = field(title);
        Self { paper }
    }

    /// Set authors from a list of display names
    pub fn authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = authors
            .into_iter()
            .map(|a| a.as_ref().trim().to_string())
            .filter(|a| !a.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        self.paper.authors = field(joined);
        self
    }

    pub fn abstract_text(mut self, abstract_text: impl Into<String>) -> Self {
        self.paper.r#abstract = field(abstract_text);
        self
    }

    pub fn year(mut self, year: impl Into<String>) -> Self {
        self.paper.year = field(year);
        self
    }

    pub fn journal(mut self, journal: impl Into<String>) -> Self {
        self.paper.journal = field(journal);
        self
    }

    pub fn volume(mut self, volume: impl Into<String>) -> Self {
        self.paper.volume = field(volume);
        self
    }

    pub fn issue_number(mut self, issue: impl Into<String>) -> Self {
        self.paper.issue_number = field(issue);
        self
    }

    pub fn pages(mut self, pages: impl Into<String>) -> Self {
        self.paper.pages = field(pages);
        self
    }

    pub fn publisher(mut self, publisher: impl Into<String>) -> Self {
        self.paper.publisher = field(publisher);
        self
    }

    /// Set ISSNs; joined with `", "`
    pub fn issns<I, S>(mut self, issns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.paper.issn = join_issns(issns);
        self
    }

    pub fn citation_count(mut self, count: CitationCount) -> Self {
        self.paper.citation_count = count;
        self
    }

    pub fn doi(mut self, doi: impl Into<String>) -> Self {
        self.paper.doi = field(doi);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.paper.url = field(url);
        self
    }

    pub fn build(self) -> PaperRecord {
        self.paper
    }
}

/// Comma-joins an ISSN list, or yields the sentinel when it is empty.
pub fn join_issns<I, S>(issns: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let joined = issns
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    field(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paper_builder() {
        let paper = PaperBuilder::new("Test Paper")
            .authors(["John Doe", "Jane Smith"])
            .abstract_text("  This is a test abstract.\n")
            .doi("10.1234/test.1234")
            .citation_count(CitationCount::Count(42))
            .build();

        assert_eq!(paper.title, "Test Paper");
        assert_eq!(paper.authors, "John Doe, Jane Smith");
        assert_eq!(paper.r#abstract, "This is a test abstract.");
        assert_eq!(paper.doi(), Some("10.1234/test.1234"));
        assert_eq!(paper.citation_count, CitationCount::Count(42));
        assert_eq!(paper.journal, NOT_AVAILABLE);
    }

    #[test]
    fn test_blank_values_become_sentinel() {
        let paper = PaperBuilder::new("")
            .authors(Vec::<String>::new())
            .issns(Vec::<String>::new())
            .doi("   ")
            .build();

        assert_eq!(paper.title, NOT_AVAILABLE);
        assert_eq!(paper.authors, NOT_AVAILABLE);
        assert_eq!(paper.issn, NOT_AVAILABLE);
        assert_eq!(paper.doi(), None);
    }

    #[test]
    fn test_dedup_key_prefers_doi() {
        let both = PaperBuilder::new("T")
            .doi("10.1/x")
            .url("https://example.com/x")
            .build();
        assert_eq!(both.dedup_key(), Some("10.1/x"));

        let url_only = PaperBuilder::new("T").url("http://arxiv.org/abs/1").build();
        assert_eq!(url_only.dedup_key(), Some("http://arxiv.org/abs/1"));

        assert_eq!(PaperRecord::default().dedup_key(), None);
    }

    #[test]
    fn test_every_field_serialized() {
        let json = serde_json::to_value(PaperRecord::default()).unwrap();
        let obj = json.as_object().unwrap();

        assert_eq!(obj.len(), 13);
        assert_eq!(obj["citation_count"], "N/A");
        assert_eq!(obj["abstract"], "N/A");
    }

    #[test]
    fn test_reads_legacy_field_names() {
        let json = r#"{
            "title": "Legacy",
            "author": "A One, B Two",
            "number": "4",
            "year": 2020,
            "citation_count": 17
        }"#;
        let paper: PaperRecord = serde_json::from_str(json).unwrap();

        assert_eq!(paper.authors, "A One, B Two");
        assert_eq!(paper.issue_number, "4");
        assert_eq!(paper.year, "2020");
        assert_eq!(paper.citation_count, CitationCount::Count(17));
        assert_eq!(paper.doi, NOT_AVAILABLE);
    }
}
