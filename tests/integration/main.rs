//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the store and purchase-history
//! APIs and drive the real reqwest client end-to-end.

mod fetch_tests;
mod harvest_tests;

use storefront_harvest::config::{parse_config, Config};
use std::path::Path;

/// Builds a config pointing both endpoints at `base_url`
///
/// Pacing is shortened so runs finish quickly: no delay between units and
/// the smallest allowed backoff.
pub fn test_config(base_url: &str, dir: &Path, backend: &str) -> Config {
    let toml = format!(
        r#"
[api]
store-base-url = "{base}/store"
purchase-history-url = "{base}/history"
timeout-secs = 5

[api.store-headers]
"X-Client" = "harvest-test"

[crawler]
initial-backoff-secs = 1
request-delay-ms = 0

[output]
backend = "{backend}"
database-path = "{dir}/harvest.db"
stores-json-path = "{dir}/stores.json"
purchases-json-path = "{dir}/purchases.json"
store-checkpoint-path = "{dir}/checkpoint.txt"
purchase-checkpoint-path = "{dir}/purchase_checkpoint.txt"
"#,
        base = base_url,
        backend = backend,
        dir = dir.display()
    );
    parse_config(&toml).expect("test config should be valid")
}
