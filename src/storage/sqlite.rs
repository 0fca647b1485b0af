//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the `RecordStore`
//! and `PurchaseSink` traits.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{PurchaseSink, RecordStore, StorageError, StorageResult};
use crate::storage::{PurchaseRecord, StoreRecord};
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// All purchase records, ordered by store id
    pub fn purchase_records(&self) -> StorageResult<Vec<PurchaseRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT store_id, merchant_id, payload FROM purchase_records ORDER BY store_id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (store_id, merchant_id, payload) = row?;
            records.push(PurchaseRecord {
                store_id,
                merchant_id,
                payload: serde_json::from_str(&payload)?,
            });
        }

        Ok(records)
    }
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

impl RecordStore for SqliteStorage {
    fn insert(&mut self, record: &StoreRecord) -> StorageResult<()> {
        let payload = serde_json::to_string(&record.payload)?;
        let now = Utc::now().to_rfc3339();

        let result = self.conn.execute(
            "INSERT INTO store_records (store_id, seq, payload, fetched_at)
             VALUES (?1, (SELECT COALESCE(MAX(seq) + 1, 0) FROM store_records), ?2, ?3)",
            params![record.store_id, payload, now],
        );

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_constraint_violation(&e) => Err(StorageError::Duplicate {
                store_id: record.store_id,
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn max_key(&self) -> StorageResult<Option<i64>> {
        let max = self
            .conn
            .query_row("SELECT MAX(store_id) FROM store_records", [], |row| {
                row.get::<_, Option<i64>>(0)
            })?;
        Ok(max)
    }

    fn records_from(&self, offset: usize) -> StorageResult<Vec<StoreRecord>> {
        let offset = i64::try_from(offset)
            .map_err(|_| StorageError::Database(format!("offset {} out of range", offset)))?;

        let mut stmt = self.conn.prepare(
            "SELECT store_id, payload FROM store_records ORDER BY seq LIMIT -1 OFFSET ?1",
        )?;

        let rows = stmt.query_map(params![offset], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (store_id, payload) = row?;
            records.push(StoreRecord {
                store_id,
                payload: serde_json::from_str(&payload)?,
            });
        }

        Ok(records)
    }

    fn count_records(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM store_records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn flush_records(&mut self) -> StorageResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }
}

impl PurchaseSink for SqliteStorage {
    fn append(&mut self, batch: &[PurchaseRecord]) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO purchase_records
                     (store_id, merchant_id, payload, fetched_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for record in batch {
                let payload = serde_json::to_string(&record.payload)?;
                stmt.execute(params![record.store_id, record.merchant_id, payload, now])?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    fn count_purchases(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM purchase_records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn flush_purchases(&mut self) -> StorageResult<()> {
        self.flush_records()
    }
}
