//! Storage module for persisting harvested records and progress
//!
//! This module handles:
//! - Store and purchase record persistence (SQLite or flat JSON files)
//! - Checkpoint markers and resume-position resolution
//! - Crash-safe file replacement

mod checkpoint;
mod json_file;
mod schema;
mod sqlite;
mod traits;

pub use checkpoint::{read_marker, CheckpointTracker, ProgressSource};
pub use json_file::{load_array, save_array, JsonPurchaseSink, JsonRecordStore};
pub use sqlite::SqliteStorage;
pub use traits::{PurchaseSink, RecordStore, StorageError, StorageResult, StoredEntry};

use crate::config::{Backend, OutputConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::Path;

/// One record fetched from the store endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub store_id: i64,

    /// Response body, stored verbatim
    #[serde(rename = "data")]
    pub payload: Value,
}

/// One record fetched from the purchase-history endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub store_id: i64,
    pub merchant_id: String,

    #[serde(rename = "purchase_history")]
    pub payload: Value,
}

/// Replaces the file at `path` with `contents` via a temp file in the same directory
///
/// Readers see either the old contents or the new, never a partial write.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> StorageResult<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
    temp_file.write_all(contents)?;
    temp_file.as_file().sync_all()?;
    temp_file.persist(path).map_err(|e| e.error)?;

    Ok(())
}

/// Opens the record store selected by the output configuration
pub fn open_record_store(config: &OutputConfig) -> StorageResult<Box<dyn RecordStore>> {
    match config.backend {
        Backend::Sqlite => Ok(Box::new(SqliteStorage::new(Path::new(required(
            &config.database_path,
            "database-path",
        )?))?)),
        Backend::Json => Ok(Box::new(JsonRecordStore::open(required(
            &config.stores_json_path,
            "stores-json-path",
        )?)?)),
    }
}

/// Opens the purchase sink selected by the output configuration
pub fn open_purchase_sink(config: &OutputConfig) -> StorageResult<Box<dyn PurchaseSink>> {
    match config.backend {
        Backend::Sqlite => Ok(Box::new(SqliteStorage::new(Path::new(required(
            &config.database_path,
            "database-path",
        )?))?)),
        Backend::Json => Ok(Box::new(JsonPurchaseSink::open(required(
            &config.purchases_json_path,
            "purchases-json-path",
        )?)?)),
    }
}

fn required<'a>(value: &'a Option<String>, key: &str) -> StorageResult<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| StorageError::Database(format!("{} is not configured", key)))
}
