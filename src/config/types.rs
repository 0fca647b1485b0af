use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Storefront Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub crawler: CrawlerConfig,
    pub output: OutputConfig,
}

/// Upstream API endpoints and request shaping
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the store endpoint; the identifier is appended as a path segment
    #[serde(rename = "store-base-url")]
    pub store_base_url: String,

    /// URL of the purchase-history endpoint
    #[serde(rename = "purchase-history-url")]
    pub purchase_history_url: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Status codes the upstream uses to signal rate limiting
    #[serde(
        rename = "rate-limit-statuses",
        default = "default_rate_limit_statuses"
    )]
    pub rate_limit_statuses: Vec<u16>,

    /// Headers sent with every store request
    #[serde(rename = "store-headers", default)]
    pub store_headers: BTreeMap<String, String>,

    /// Headers sent with every purchase-history request
    #[serde(rename = "purchase-headers", default)]
    pub purchase_headers: BTreeMap<String, String>,
}

/// Crawl pacing and termination configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Initial wait after a rate-limit response (seconds); doubles on each repeat
    #[serde(rename = "initial-backoff-secs", default = "default_initial_backoff")]
    pub initial_backoff_secs: u64,

    /// Fixed pause after every completed unit of work (milliseconds)
    #[serde(rename = "request-delay-ms", default = "default_request_delay")]
    pub request_delay_ms: u64,

    /// First identifier to try when no progress has been recorded
    #[serde(rename = "start-id", default = "default_start_id")]
    pub start_id: i64,

    /// Last identifier to try; the walk is unbounded when absent
    #[serde(rename = "max-store-id", default)]
    pub max_store_id: Option<i64>,

    /// Consecutive rate-limit responses tolerated before stopping; unbounded when absent
    #[serde(rename = "max-rate-limit-retries", default)]
    pub max_rate_limit_retries: Option<u32>,

    /// Dotted path to the merchant identifier inside a stored record
    #[serde(rename = "merchant-id-path", default = "default_merchant_id_path")]
    pub merchant_id_path: String,
}

impl CrawlerConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_secs(self.initial_backoff_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

/// Which persistence backend holds the harvested records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Sqlite,
    Json,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_backend")]
    pub backend: Backend,

    /// Path to the SQLite database file (sqlite backend)
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,

    /// Path to the store records JSON array (json backend)
    #[serde(rename = "stores-json-path", default)]
    pub stores_json_path: Option<String>,

    /// Path to the purchase records JSON array (json backend)
    #[serde(rename = "purchases-json-path", default)]
    pub purchases_json_path: Option<String>,

    /// Progress marker for the store walk
    #[serde(
        rename = "store-checkpoint-path",
        default = "default_store_checkpoint"
    )]
    pub store_checkpoint_path: String,

    /// Progress marker for the purchase-history join
    #[serde(
        rename = "purchase-checkpoint-path",
        default = "default_purchase_checkpoint"
    )]
    pub purchase_checkpoint_path: String,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_rate_limit_statuses() -> Vec<u16> {
    vec![403]
}

fn default_initial_backoff() -> u64 {
    5
}

fn default_request_delay() -> u64 {
    1000
}

fn default_start_id() -> i64 {
    1
}

fn default_merchant_id_path() -> String {
    "store.merchantID".to_string()
}

fn default_backend() -> Backend {
    Backend::Sqlite
}

fn default_store_checkpoint() -> String {
    "checkpoint.txt".to_string()
}

fn default_purchase_checkpoint() -> String {
    "purchase_history_checkpoint.txt".to_string()
}
