//! Harvest statistics
//!
//! Reads record counts from the configured backend and the two checkpoint
//! markers, and prints them in a human-readable form.

use crate::config::{Backend, OutputConfig};
use crate::storage::{open_purchase_sink, open_record_store, read_marker, StorageResult};
use std::path::Path;

/// Snapshot of harvest progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestStatistics {
    /// Backend the counts were read from
    pub backend: Backend,

    /// Number of store records held
    pub store_records: u64,

    /// Highest store identifier held
    pub max_store_id: Option<i64>,

    /// Number of purchase-history records held
    pub purchase_records: u64,

    /// Next store identifier the walk would request
    pub store_checkpoint: Option<i64>,

    /// Next input index the join would process
    pub purchase_checkpoint: Option<i64>,
}

impl HarvestStatistics {
    /// Store records the join has not reached yet
    pub fn join_remaining(&self) -> u64 {
        let done = self.purchase_checkpoint.unwrap_or(0).max(0) as u64;
        self.store_records.saturating_sub(done)
    }
}

/// Loads statistics for the configured output
///
/// # Arguments
///
/// * `config` - The output configuration naming backend and markers
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - A backend could not be opened or queried
pub fn load_statistics(config: &OutputConfig) -> StorageResult<HarvestStatistics> {
    let store = open_record_store(config)?;
    let sink = open_purchase_sink(config)?;

    Ok(HarvestStatistics {
        backend: config.backend,
        store_records: store.count_records()?,
        max_store_id: store.max_key()?,
        purchase_records: sink.count_purchases()?,
        store_checkpoint: marker_value(Path::new(&config.store_checkpoint_path)),
        purchase_checkpoint: marker_value(Path::new(&config.purchase_checkpoint_path)),
    })
}

fn marker_value(path: &Path) -> Option<i64> {
    read_marker(path).unwrap_or_else(|e| {
        tracing::warn!("Could not read checkpoint {}: {}", path.display(), e);
        None
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Backend: {:?}", stats.backend);
    println!();

    println!("Stores:");
    println!("  Records stored: {}", stats.store_records);
    match stats.max_store_id {
        Some(max) => println!("  Highest storeID: {}", max),
        None => println!("  Highest storeID: -"),
    }
    println!("  Next storeID: {}", display_marker(stats.store_checkpoint));
    println!();

    println!("Purchase history:");
    println!("  Records stored: {}", stats.purchase_records);
    println!("  Next entry: {}", display_marker(stats.purchase_checkpoint));
    println!("  Entries remaining: {}", stats.join_remaining());
}

fn display_marker(value: Option<i64>) -> String {
    value.map_or_else(|| "not started".to_string(), |v| v.to_string())
}
