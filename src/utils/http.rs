//! HTTP client utilities.

use reqwest::{Client, RequestBuilder};
use std::sync::Arc;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::sources::SourceError;

/// Shared HTTP client with explicit connect and request timeouts.
///
/// Every request made through this client is bounded by the configured
/// timeout, including the per-identifier PubMed detail fetches.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
    mailto: Option<String>,
}

impl HttpClient {
    /// Create a new HTTP client from configuration
    pub fn new(config: &HttpConfig) -> Result<Self, SourceError> {
        let user_agent = config.user_agent.clone().unwrap_or_else(default_user_agent);

        let mut builder = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90));

        if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| SourceError::InvalidRequest(format!("Invalid proxy: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            mailto: config.mailto.clone().filter(|m| !m.trim().is_empty()),
        })
    }

    /// Start a GET request
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Contact address for polite API pools, if configured
    pub fn mailto(&self) -> Option<&str> {
        self.mailto.as_deref()
    }
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Sends a prepared request and returns the body of a successful response.
///
/// Non-success status codes become [`SourceError::Api`], tagged with `what`.
pub async fn get_text(request: RequestBuilder, what: &str) -> Result<String, SourceError> {
    let response = request
        .send()
        .await
        .map_err(|e| SourceError::Network(format!("Failed to fetch {}: {}", what, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Api(format!(
            "{} returned status: {}",
            what, status
        )));
    }

    response
        .text()
        .await
        .map_err(|e| SourceError::Network(format!("Failed to read {} response: {}", what, e)))
}
