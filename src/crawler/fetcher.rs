//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the harvester, including:
//! - Building the HTTP client and per-endpoint header sets
//! - Issuing store and purchase-history requests
//! - Classifying every response into success, rate limited, or terminal

use crate::config::ApiConfig;
use crate::HarvestError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Result of a single fetch attempt
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// HTTP 200 with a JSON body
    Success(Value),

    /// The upstream asked us to slow down
    RateLimited {
        /// The status code that signalled it
        status: u16,
    },

    /// Any other result
    ///
    /// For the store walk this marks the end of the identifier space; the
    /// status is kept so a genuine API failure can be told apart from the
    /// expected end-of-space response.
    Terminal {
        /// HTTP status, or `None` when no usable response arrived
        status: Option<u16>,
        /// Human-readable cause
        reason: String,
    },
}

/// Boundary between the harvest engine and the upstream API
///
/// Implementations perform exactly one request per call and never retry;
/// retrying is the caller's decision.
#[allow(async_fn_in_trait)]
pub trait FetchClient {
    /// Fetches the record for one store identifier
    async fn fetch_store(&self, store_id: i64) -> FetchOutcome;

    /// Fetches the purchase history of a merchant's store
    async fn fetch_purchase_history(&self, merchant_id: &str, store_id: i64) -> FetchOutcome;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The API configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Converts configured header pairs into a header map
pub fn build_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, HarvestError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| HarvestError::Header(format!("invalid header name '{}'", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| HarvestError::Header(format!("invalid value for header '{}'", name)))?;
        map.insert(name, value);
    }
    Ok(map)
}

/// Fetch client backed by reqwest
pub struct HttpFetchClient {
    client: Client,
    store_base_url: String,
    purchase_history_url: String,
    store_headers: HeaderMap,
    purchase_headers: HeaderMap,
    rate_limit_statuses: Vec<u16>,
}

impl HttpFetchClient {
    pub fn new(config: &ApiConfig) -> Result<Self, HarvestError> {
        Ok(Self {
            client: build_http_client(config)?,
            store_base_url: config.store_base_url.trim_end_matches('/').to_string(),
            purchase_history_url: config.purchase_history_url.clone(),
            store_headers: build_header_map(&config.store_headers)?,
            purchase_headers: build_header_map(&config.purchase_headers)?,
            rate_limit_statuses: config.rate_limit_statuses.clone(),
        })
    }

    /// URL requested for a store identifier (query string excluded)
    pub fn store_url(&self, store_id: i64) -> String {
        format!("{}/{}", self.store_base_url, store_id)
    }

    async fn execute(&self, request: RequestBuilder, label: &str) -> FetchOutcome {
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() {
                    "request timeout".to_string()
                } else if e.is_connect() {
                    "connection failed".to_string()
                } else {
                    e.to_string()
                };
                tracing::warn!("Requesting {} failed: {}", label, reason);
                return FetchOutcome::Terminal {
                    status: None,
                    reason,
                };
            }
        };

        let status = response.status();
        tracing::info!("Requesting {}, Status Code: {}", label, status.as_u16());

        if status == StatusCode::OK {
            return match response.json::<Value>().await {
                Ok(body) => FetchOutcome::Success(body),
                Err(e) => FetchOutcome::Terminal {
                    status: None,
                    reason: format!("unreadable response body: {}", e),
                },
            };
        }

        classify_status(status.as_u16(), &self.rate_limit_statuses)
    }
}

/// Classifies a non-200 status code
pub fn classify_status(status: u16, rate_limit_statuses: &[u16]) -> FetchOutcome {
    if rate_limit_statuses.contains(&status) {
        FetchOutcome::RateLimited { status }
    } else {
        FetchOutcome::Terminal {
            status: Some(status),
            reason: format!("HTTP {}", status),
        }
    }
}

impl FetchClient for HttpFetchClient {
    async fn fetch_store(&self, store_id: i64) -> FetchOutcome {
        let request = self
            .client
            .get(self.store_url(store_id))
            .query(&[("serviceSubtype", "fine")])
            .headers(self.store_headers.clone());

        self.execute(request, &format!("storeID: {}", store_id))
            .await
    }

    async fn fetch_purchase_history(&self, merchant_id: &str, store_id: i64) -> FetchOutcome {
        let store_param = store_id.to_string();
        let request = self
            .client
            .get(&self.purchase_history_url)
            .query(&[("merchantID", merchant_id), ("storeID", store_param.as_str())])
            .headers(self.purchase_headers.clone());

        self.execute(
            request,
            &format!(
                "purchase history for storeID: {}, merchantID: {}",
                store_id, merchant_id
            ),
        )
        .await
    }
}
