//! Utility modules supporting the fetch cycle.
//!
//! - [`HttpClient`]: shared HTTP client with connect and request timeouts
//! - [`get_text`]: send a request and return the body of a successful response
//! - [`BackoffPolicy`] / [`with_backoff`]: bounded exponential backoff
//! - [`DedupSet`]: identifiers already present in the store
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use paper_fetcher::sources::SourceError;
//! use paper_fetcher::utils::{with_backoff, BackoffPolicy};
//!
//! # async fn scrape() -> Result<Vec<String>, SourceError> { Ok(vec![]) }
//! # #[tokio::main]
//! # async fn main() {
//! let hits = with_backoff(BackoffPolicy::default(), scrape)
//!     .await
//!     .into_value()
//!     .unwrap_or_default();
//! # }
//! ```

mod dedup;
mod http;
mod retry;

pub use dedup::DedupSet;
pub use http::{get_text, HttpClient};
pub use retry::{with_backoff, BackoffPolicy, RetryResult};
