//! Harvest engine
//!
//! This module contains the two sequential stages of a harvest:
//! - The store walker, which enumerates store identifiers until the API
//!   reports the end of the space
//! - The purchase join, which replays stored records and fetches each
//!   merchant's purchase history
//!
//! Both stages share the same fetch boundary, backoff handling, and
//! checkpointing, and both pace themselves with a single sleep per unit.

mod fetcher;
mod join;
mod retry;
mod walker;

#[cfg(test)]
pub(crate) mod testing;

pub use fetcher::{
    build_header_map, build_http_client, classify_status, FetchClient, FetchOutcome,
    HttpFetchClient,
};
pub use join::{extract_merchant_id, PurchaseJoin};
pub use walker::{resume_sources, StoreWalker};

pub use crate::state::{RunSummary, StopReason};

use crate::config::{Config, CrawlerConfig};
use crate::state::BackoffController;
use crate::storage::{open_purchase_sink, open_record_store, CheckpointTracker, ProgressSource};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Pacing and termination knobs shared by both stages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestOptions {
    pub initial_backoff: Duration,
    pub request_delay: Duration,
    pub max_store_id: Option<i64>,
    pub max_rate_limit_retries: Option<u32>,
    pub merchant_id_path: String,
}

impl Default for HarvestOptions {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(5),
            request_delay: Duration::from_secs(1),
            max_store_id: None,
            max_rate_limit_retries: None,
            merchant_id_path: "store.merchantID".to_string(),
        }
    }
}

impl From<&CrawlerConfig> for HarvestOptions {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            initial_backoff: config.initial_backoff(),
            request_delay: config.request_delay(),
            max_store_id: config.max_store_id,
            max_rate_limit_retries: config.max_rate_limit_retries,
            merchant_id_path: config.merchant_id_path.clone(),
        }
    }
}

impl HarvestOptions {
    /// A fresh controller; each stage owns its own
    pub fn backoff_controller(&self) -> BackoffController {
        BackoffController::new(self.initial_backoff).with_max_retries(self.max_rate_limit_retries)
    }
}

/// Runs the store walk described by `config`
///
/// Resumes at the furthest of one past the highest stored id and the
/// checkpoint marker, else at `start-id`.
///
/// # Returns
///
/// * `Ok(RunSummary)` - The walk ran to one of its stop conditions
/// * `Err(HarvestError)` - Storage or client could not be set up
pub async fn harvest_stores(config: &Config) -> crate::Result<RunSummary> {
    let mut store = open_record_store(&config.output)?;
    let client = HttpFetchClient::new(&config.api)?;

    let marker = Path::new(&config.output.store_checkpoint_path);
    let checkpoint = CheckpointTracker::load(
        marker,
        &resume_sources(store.max_key()?, marker, config.crawler.start_id),
    )?;

    let options = HarvestOptions::from(&config.crawler);
    let summary = StoreWalker::new(&client, &mut *store, checkpoint, options)
        .run()
        .await;
    Ok(summary)
}

/// Runs the purchase-history join over the records gathered by the walk
///
/// # Returns
///
/// * `Ok(RunSummary)` - Every remaining entry was handled, or the retry cap hit
/// * `Err(HarvestError)` - Storage or client could not be set up
pub async fn harvest_purchases(config: &Config) -> crate::Result<RunSummary> {
    let input = open_record_store(&config.output)?;
    let mut sink = open_purchase_sink(&config.output)?;
    let client = HttpFetchClient::new(&config.api)?;

    let marker = PathBuf::from(&config.output.purchase_checkpoint_path);
    let checkpoint = CheckpointTracker::load(
        marker.clone(),
        &[ProgressSource::Marker(marker), ProgressSource::Floor(0)],
    )?;

    let options = HarvestOptions::from(&config.crawler);
    let summary = PurchaseJoin::new(&client, &mut *sink, checkpoint, options)
        .run(&*input)
        .await?;
    Ok(summary)
}
