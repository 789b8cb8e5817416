//! Search parameters shared by every source.

use serde::{Deserialize, Serialize};

/// Generic search terms. Each source interprets the subset it understands;
/// empty values are treated as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub keyword: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub journal: String,

    #[serde(default)]
    pub year: String,
}

impl SearchParams {
    /// Create search parameters from a keyword
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            ..Default::default()
        }
    }

    /// Set author filter
    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Set journal filter
    pub fn journal(mut self, journal: impl Into<String>) -> Self {
        self.journal = journal.into();
        self
    }

    /// Set year filter
    pub fn year(mut self, year: impl Into<String>) -> Self {
        self.year = year.into();
        self
    }

    /// Trimmed keyword, `None` when blank
    pub fn keyword_term(&self) -> Option<&str> {
        non_blank(&self.keyword)
    }

    /// Trimmed author, `None` when blank
    pub fn author_term(&self) -> Option<&str> {
        non_blank(&self.author)
    }

    /// Trimmed journal, `None` when blank
    pub fn journal_term(&self) -> Option<&str> {
        non_blank(&self.journal)
    }

    /// Trimmed year, `None` when blank
    pub fn year_term(&self) -> Option<&str> {
        non_blank(&self.year)
    }

    /// Whether no search term is set at all
    pub fn is_empty(&self) -> bool {
        self.keyword_term().is_none()
            && self.author_term().is_none()
            && self.journal_term().is_none()
            && self.year_term().is_none()
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

impl std::fmt::Display for SearchParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = [
            ("keyword", self.keyword_term()),
            ("author", self.author_term()),
            ("journal", self.journal_term()),
            ("year", self.year_term()),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| format!("{}={:?}", k, v)))
        .collect();

        if parts.is_empty() {
            write!(f, "(no search terms)")
        } else {
            write!(f, "{}", parts.join(" "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_terms_are_unset() {
        let params = SearchParams::new("  cancer ").author("   ").year("2020");

        assert_eq!(params.keyword_term(), Some("cancer"));
        assert_eq!(params.author_term(), None);
        assert_eq!(params.journal_term(), None);
        assert_eq!(params.year_term(), Some("2020"));
        assert!(!params.is_empty());
        assert!(SearchParams::default().is_empty());
    }

    #[test]
    fn test_display() {
        let params = SearchParams::new("cancer").journal("Nature");
        assert_eq!(params.to_string(), r#"keyword="cancer" journal="Nature""#);
        assert_eq!(SearchParams::default().to_string(), "(no search terms)");
    }
}
