//! Flat-file JSON storage
//!
//! Records live in a single JSON array per file, the same shape the export
//! command produces. The whole array is rewritten on every write through a
//! temp file and rename, so a crash never leaves a half-written file behind.

use crate::storage::traits::{PurchaseSink, RecordStore, StorageError, StorageResult, StoredEntry};
use crate::storage::{write_atomic, PurchaseRecord, StoreRecord};
use crate::DataShapeError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Reads a JSON array file; a missing file is an empty array
pub fn load_array<T: DeserializeOwned>(path: &Path) -> StorageResult<Vec<T>> {
    match std::fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::Serialization(format!("{}: {}", path.display(), e))
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Writes a JSON array file atomically
pub fn save_array<T: Serialize>(path: &Path, items: &[T]) -> StorageResult<()> {
    let json = serde_json::to_vec_pretty(items)?;
    write_atomic(path, &json)
}

/// Reads one element of a store array as a record
fn parse_entry(entry: &Value) -> Result<StoreRecord, DataShapeError> {
    let store_id = entry
        .get("store_id")
        .ok_or_else(|| DataShapeError::MissingField {
            path: "store_id".to_string(),
        })?
        .as_i64()
        .ok_or_else(|| DataShapeError::UnsupportedType {
            path: "store_id".to_string(),
        })?;
    let payload = entry
        .get("data")
        .cloned()
        .ok_or_else(|| DataShapeError::MissingField {
            path: "data".to_string(),
        })?;

    Ok(StoreRecord { store_id, payload })
}

/// Store records kept in a JSON array file
///
/// Elements are held as raw JSON so that a malformed one survives rewrites
/// and keeps its position in the array.
pub struct JsonRecordStore {
    path: PathBuf,
    entries: Vec<Value>,
    keys: HashSet<i64>,
}

impl JsonRecordStore {
    /// Opens the file at `path`, loading any entries already present
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let entries: Vec<Value> = load_array(&path)?;

        let mut keys = HashSet::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            match parse_entry(entry) {
                Ok(record) => {
                    if !keys.insert(record.store_id) {
                        tracing::warn!(
                            "{} holds store {} more than once",
                            path.display(),
                            record.store_id
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!("{} entry {} is malformed: {}", path.display(), index, e);
                }
            }
        }

        Ok(Self {
            path,
            entries,
            keys,
        })
    }
}

impl RecordStore for JsonRecordStore {
    /// A failed write keeps the record in memory; it reaches disk with the
    /// next successful write.
    fn insert(&mut self, record: &StoreRecord) -> StorageResult<()> {
        if self.keys.contains(&record.store_id) {
            return Err(StorageError::Duplicate {
                store_id: record.store_id,
            });
        }

        self.entries.push(serde_json::to_value(record)?);
        self.keys.insert(record.store_id);
        save_array(&self.path, &self.entries)
    }

    fn max_key(&self) -> StorageResult<Option<i64>> {
        Ok(self.keys.iter().copied().max())
    }

    /// Malformed entries are left out
    fn records_from(&self, offset: usize) -> StorageResult<Vec<StoreRecord>> {
        Ok(self
            .entries
            .iter()
            .skip(offset)
            .filter_map(|entry| parse_entry(entry).ok())
            .collect())
    }

    fn entries_from(&self, offset: usize) -> StorageResult<Vec<StoredEntry>> {
        Ok(self.entries.iter().skip(offset).map(parse_entry).collect())
    }

    fn count_records(&self) -> StorageResult<u64> {
        Ok(self.entries.len() as u64)
    }

    fn flush_records(&mut self) -> StorageResult<()> {
        save_array(&self.path, &self.entries)
    }
}

/// Purchase records kept in a JSON array file
pub struct JsonPurchaseSink {
    path: PathBuf,
    records: Vec<PurchaseRecord>,
}

impl JsonPurchaseSink {
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        let records = load_array(&path)?;
        Ok(Self { path, records })
    }

    pub fn records(&self) -> &[PurchaseRecord] {
        &self.records
    }
}

impl PurchaseSink for JsonPurchaseSink {
    fn append(&mut self, batch: &[PurchaseRecord]) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        for record in batch {
            match self
                .records
                .iter_mut()
                .find(|existing| existing.store_id == record.store_id)
            {
                Some(existing) => *existing = record.clone(),
                None => self.records.push(record.clone()),
            }
        }

        save_array(&self.path, &self.records)
    }

    fn count_purchases(&self) -> StorageResult<u64> {
        Ok(self.records.len() as u64)
    }

    fn flush_purchases(&mut self) -> StorageResult<()> {
        save_array(&self.path, &self.records)
    }
}
