//! Core data models for paper records and search parameters.

mod paper;
mod search;

pub use paper::{
    is_available, join_issns, CitationCount, PaperBuilder, PaperRecord, NOT_AVAILABLE,
};
pub use search::SearchParams;
