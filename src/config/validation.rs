use crate::config::types::{ApiConfig, Backend, Config, CrawlerConfig, OutputConfig};
use crate::ConfigError;
use reqwest::header::{HeaderName, HeaderValue};
use std::collections::BTreeMap;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_crawler_config(&config.crawler)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates endpoint URLs, status classification and headers
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    validate_endpoint("store-base-url", &config.store_base_url)?;
    validate_endpoint("purchase-history-url", &config.purchase_history_url)?;

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    for &status in &config.rate_limit_statuses {
        if !(100..=599).contains(&status) {
            return Err(ConfigError::Validation(format!(
                "rate-limit-statuses entry {} is not an HTTP status code",
                status
            )));
        }
        // 200 is the success signal and can never mean "slow down"
        if status == 200 {
            return Err(ConfigError::Validation(
                "rate-limit-statuses cannot contain 200".to_string(),
            ));
        }
    }

    validate_headers("store-headers", &config.store_headers)?;
    validate_headers("purchase-headers", &config.purchase_headers)?;

    Ok(())
}

fn validate_endpoint(key: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", key, value, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            key, value
        )));
    }

    Ok(())
}

fn validate_headers(key: &str, headers: &BTreeMap<String, String>) -> Result<(), ConfigError> {
    for (name, value) in headers {
        HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ConfigError::Validation(format!("{}: invalid header name '{}'", key, name))
        })?;
        HeaderValue::from_str(value).map_err(|_| {
            ConfigError::Validation(format!("{}: invalid value for header '{}'", key, name))
        })?;
    }
    Ok(())
}

/// Validates pacing and termination settings
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.initial_backoff_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "initial-backoff-secs must be >= 1, got {}",
            config.initial_backoff_secs
        )));
    }

    if config.start_id < 0 {
        return Err(ConfigError::Validation(format!(
            "start-id must be >= 0, got {}",
            config.start_id
        )));
    }

    if let Some(max) = config.max_store_id {
        if max < config.start_id {
            return Err(ConfigError::Validation(format!(
                "max-store-id ({}) must be >= start-id ({})",
                max, config.start_id
            )));
        }
    }

    if config.max_rate_limit_retries == Some(0) {
        return Err(ConfigError::Validation(
            "max-rate-limit-retries must be >= 1 when set".to_string(),
        ));
    }

    if config.merchant_id_path.split('.').any(str::is_empty) {
        return Err(ConfigError::Validation(format!(
            "merchant-id-path '{}' contains an empty segment",
            config.merchant_id_path
        )));
    }

    Ok(())
}

/// Validates output configuration for the selected backend
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    match config.backend {
        Backend::Sqlite => require_path("database-path", &config.database_path)?,
        Backend::Json => {
            require_path("stores-json-path", &config.stores_json_path)?;
            require_path("purchases-json-path", &config.purchases_json_path)?;
        }
    }

    if config.store_checkpoint_path.is_empty() {
        return Err(ConfigError::Validation(
            "store-checkpoint-path cannot be empty".to_string(),
        ));
    }

    if config.purchase_checkpoint_path.is_empty() {
        return Err(ConfigError::Validation(
            "purchase-checkpoint-path cannot be empty".to_string(),
        ));
    }

    if config.store_checkpoint_path == config.purchase_checkpoint_path {
        return Err(ConfigError::Validation(
            "store and purchase checkpoints must use different files".to_string(),
        ));
    }

    Ok(())
}

fn require_path(key: &str, value: &Option<String>) -> Result<(), ConfigError> {
    match value.as_deref() {
        Some(path) if !path.is_empty() => Ok(()),
        _ => Err(ConfigError::Validation(format!(
            "{} is required for the selected backend",
            key
        ))),
    }
}
