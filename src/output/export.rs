//! JSON export of harvested records
//!
//! Dumps the SQLite tables to the flat JSON array layout used by the json
//! backend, so either backend's output can be consumed the same way.

use crate::storage::{save_array, RecordStore, SqliteStorage, StorageResult};
use std::path::Path;

/// Number of records written by an export
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportCounts {
    pub stores: usize,
    pub purchases: Option<usize>,
}

/// Writes store records (and optionally purchase records) as JSON arrays
///
/// Store records keep the order the walk produced them in; purchase records
/// are ordered by store id.
pub fn export_json(
    storage: &SqliteStorage,
    stores_path: &Path,
    purchases_path: Option<&Path>,
) -> StorageResult<ExportCounts> {
    let stores = storage.records_from(0)?;
    save_array(stores_path, &stores)?;
    tracing::info!("Exported {} store records to {}", stores.len(), stores_path.display());

    let purchases = match purchases_path {
        Some(path) => {
            let records = storage.purchase_records()?;
            save_array(path, &records)?;
            tracing::info!("Exported {} purchase records to {}", records.len(), path.display());
            Some(records.len())
        }
        None => None,
    };

    Ok(ExportCounts {
        stores: stores.len(),
        purchases,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{PurchaseRecord, PurchaseSink, StoreRecord};
    use serde_json::{json, Value};

    #[test]
    fn test_export_uses_json_backend_shape() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        for store_id in [2, 1] {
            storage
                .insert(&StoreRecord {
                    store_id,
                    payload: json!({"store": {"storeID": store_id}}),
                })
                .unwrap();
        }
        storage
            .append(&[PurchaseRecord {
                store_id: 2,
                merchant_id: "m-2".to_string(),
                payload: json!({"items": [1]}),
            }])
            .unwrap();

        let stores_path = dir.path().join("stores.json");
        let purchases_path = dir.path().join("purchases.json");
        let counts = export_json(&storage, &stores_path, Some(&purchases_path)).unwrap();
        assert_eq!(
            counts,
            ExportCounts {
                stores: 2,
                purchases: Some(1)
            }
        );

        let stores: Value = serde_json::from_slice(&std::fs::read(&stores_path).unwrap()).unwrap();
        assert_eq!(stores[0]["store_id"], 2);
        assert_eq!(stores[1]["data"]["store"]["storeID"], 1);

        let purchases: Value =
            serde_json::from_slice(&std::fs::read(&purchases_path).unwrap()).unwrap();
        assert_eq!(purchases[0]["merchant_id"], "m-2");
        assert_eq!(purchases[0]["purchase_history"]["items"][0], 1);
    }

    #[test]
    fn test_export_stores_only() {
        let dir = tempfile::tempdir().unwrap();
        let storage = SqliteStorage::new_in_memory().unwrap();
        let stores_path = dir.path().join("stores.json");

        let counts = export_json(&storage, &stores_path, None).unwrap();
        assert_eq!(counts.purchases, None);
        assert_eq!(std::fs::read_to_string(&stores_path).unwrap().trim(), "[]");
    }
}
