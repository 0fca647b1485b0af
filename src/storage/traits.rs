//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{PurchaseRecord, StoreRecord};
use crate::DataShapeError;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Record for store {store_id} already exists")]
    Duplicate { store_id: i64 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One stored entry, or the reason it cannot be read as a record
pub type StoredEntry = Result<StoreRecord, DataShapeError>;

/// Durable home of the store records harvested by the walker
///
/// Every write is individually atomic: a crash leaves either the whole record
/// or nothing.
pub trait RecordStore {
    /// Inserts a new record
    ///
    /// A record whose `store_id` is already present is rejected with
    /// `StorageError::Duplicate` and the existing data is left untouched.
    fn insert(&mut self, record: &StoreRecord) -> StorageResult<()>;

    /// Highest `store_id` present, if any
    fn max_key(&self) -> StorageResult<Option<i64>>;

    /// Records in insertion order, skipping the first `offset`
    fn records_from(&self, offset: usize) -> StorageResult<Vec<StoreRecord>>;

    /// Every entry in insertion order, skipping the first `offset`
    ///
    /// Unlike `records_from`, an entry that is not a well-formed record keeps
    /// its position and comes back as an error, so callers can skip it
    /// without shifting the indices of the entries after it.
    fn entries_from(&self, offset: usize) -> StorageResult<Vec<StoredEntry>> {
        Ok(self.records_from(offset)?.into_iter().map(Ok).collect())
    }

    /// Number of records held
    fn count_records(&self) -> StorageResult<u64>;

    /// Forces buffered state to durable storage
    fn flush_records(&mut self) -> StorageResult<()> {
        Ok(())
    }
}

/// Durable home of the purchase-history records produced by the join
pub trait PurchaseSink {
    /// Appends a batch of records
    ///
    /// A record for a `store_id` that already has one replaces it, so a unit
    /// redone after a crash does not produce a second row.
    fn append(&mut self, batch: &[PurchaseRecord]) -> StorageResult<()>;

    /// Number of records held
    fn count_purchases(&self) -> StorageResult<u64>;

    /// Forces buffered state to durable storage
    fn flush_purchases(&mut self) -> StorageResult<()> {
        Ok(())
    }
}
