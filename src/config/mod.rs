//! Configuration management.
//!
//! Settings are layered, lowest priority first:
//!
//! 1. built-in defaults,
//! 2. a TOML file (`--config <path>`, or `paper-fetcher.toml` in the working
//!    directory when present),
//! 3. environment variables prefixed with `PAPER_FETCHER_`; nested keys use a
//!    double underscore (`PAPER_FETCHER_HTTP__TIMEOUT_SECS=60`),
//! 4. command-line flags, applied by the binary.
//!
//! # Configuration File Format
//!
//! ```toml
//! platform = "pubmed"
//! results_dir = "results"
//! output_file_name = "cancer.json"
//! keyword = "cancer"
//! journal = "Nature"
//! year = "2020"
//! max_results = 15
//! output_json = false
//! cache_enabled = true
//!
//! [http]
//! timeout_secs = 30
//! connect_timeout_secs = 10
//! mailto = "me@example.org"
//! proxy = "socks5://127.0.0.1:9050"
//!
//! [retry]
//! max_attempts = 5
//! base_delay_secs = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::SearchParams;
use crate::sources::Platform;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "paper-fetcher";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PAPER_FETCHER";

/// Settings for one fetch cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Which source to query
    #[serde(default)]
    pub platform: Platform,

    /// Store file name inside `results_dir`; defaults per platform
    #[serde(default)]
    pub output_file_name: Option<String>,

    /// Directory holding store documents
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    #[serde(default)]
    pub keyword: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub journal: String,

    #[serde(default)]
    pub year: String,

    /// Upper bound on records requested from the source
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Emit the fetched batch as JSON on stdout
    #[serde(default)]
    pub output_json: bool,

    /// Keep the stored collection in memory between load and save
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            output_file_name: None,
            results_dir: default_results_dir(),
            keyword: String::new(),
            author: String::new(),
            journal: String::new(),
            year: String::new(),
            max_results: default_max_results(),
            output_json: false,
            cache_enabled: true,
            http: HttpConfig::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl FetchConfig {
    /// Search terms carried by this configuration
    pub fn search_params(&self) -> SearchParams {
        SearchParams {
            keyword: self.keyword.clone(),
            author: self.author.clone(),
            journal: self.journal.clone(),
            year: self.year.clone(),
        }
    }

    /// Full path of the store document
    pub fn store_path(&self) -> PathBuf {
        let file_name = self
            .output_file_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| self.platform.default_output_file());
        self.results_dir.join(file_name)
    }
}

/// HTTP client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Overrides the default `paper-fetcher/<version>` user agent
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Contact address sent to CrossRef's polite pool
    #[serde(default)]
    pub mailto: Option<String>,

    /// Proxy URL for all requests (http, https or socks5)
    #[serde(default)]
    pub proxy: Option<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            user_agent: None,
            mailto: None,
            proxy: None,
        }
    }
}

/// Backoff settings for the scholarly-search source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay")]
    pub base_delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_secs: default_base_delay(),
        }
    }
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_max_results() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_delay() -> u64 {
    10
}

/// Load configuration from an optional file plus the environment
pub fn load_config(path: Option<&Path>) -> Result<FetchConfig, config::ConfigError> {
    let file = match path {
        Some(path) => config::File::from(path).required(true),
        None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let settings = config::Config::builder()
        .add_source(file)
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    settings.try_deserialize()
}
