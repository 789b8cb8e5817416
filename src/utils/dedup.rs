//! Deduplication against previously stored records.

use std::collections::HashSet;

use crate::models::PaperRecord;

/// Set of identifiers (DOI, falling back to URL) already seen.
///
/// Rebuilt from the stored collection on load; never persisted itself.
#[derive(Debug, Clone, Default)]
pub struct DedupSet {
    keys: HashSet<String>,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the set from a collection of records
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a PaperRecord>,
    {
        let mut set = Self::new();
        set.extend(records);
        set
    }

    /// Record a paper's key; returns `false` when it has none
    pub fn insert(&mut self, record: &PaperRecord) -> bool {
        match record.dedup_key() {
            Some(key) => {
                self.keys.insert(key.to_string());
                true
            }
            None => false,
        }
    }

    pub fn extend<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'a PaperRecord>,
    {
        for record in records {
            self.insert(record);
        }
    }

    /// A record is known if either its DOI or its URL has been seen.
    pub fn contains(&self, record: &PaperRecord) -> bool {
        record.doi().is_some_and(|doi| self.keys.contains(doi))
            || record.url().is_some_and(|url| self.keys.contains(url))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    /// Keep only records not yet seen, updating the set as it goes so that
    /// repeats inside `records` are dropped too.
    pub fn retain_new(&mut self, records: Vec<PaperRecord>) -> Vec<PaperRecord> {
        let mut fresh = Vec::with_capacity(records.len());
        for record in records {
            if self.contains(&record) {
                tracing::debug!(
                    "Skipping known paper: {}",
                    record.dedup_key().unwrap_or(&record.title)
                );
                continue;
            }
            self.insert(&record);
            fresh.push(record);
        }
        fresh
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
