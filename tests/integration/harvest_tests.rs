//! Both harvest stages end-to-end against a mock API

use crate::test_config;
use serde_json::json;
use std::path::Path;
use storefront_harvest::crawler::{harvest_purchases, harvest_stores, StopReason};
use storefront_harvest::storage::{
    load_array, read_marker, PurchaseRecord, PurchaseSink, RecordStore, SqliteStorage, StoreRecord,
};
use wiremock::matchers::{method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn store_body(store_id: i64) -> serde_json::Value {
    json!({"store": {"storeID": store_id, "merchantID": format!("m-{}", store_id)}})
}

async fn mount_store(server: &MockServer, store_id: i64) {
    Mock::given(method("GET"))
        .and(path(format!("/store/{}", store_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(store_body(store_id)))
        .mount(server)
        .await;
}

async fn store_requests(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path().starts_with("/store/"))
        .map(|r| r.url.path().to_string())
        .collect()
}

fn stored_ids(db: &Path) -> Vec<i64> {
    SqliteStorage::new(db)
        .unwrap()
        .records_from(0)
        .unwrap()
        .iter()
        .map(|r| r.store_id)
        .collect()
}

#[tokio::test]
async fn test_walk_retries_rate_limit_then_stops_at_404() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.uri(), dir.path(), "sqlite");

    mount_store(&server, 1).await;
    mount_store(&server, 2).await;
    // Registered first so it answers the first request for id 3
    Mock::given(method("GET"))
        .and(path("/store/3"))
        .respond_with(ResponseTemplate::new(403))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_store(&server, 3).await;

    let summary = harvest_stores(&config).await.unwrap();

    assert_eq!(summary.stop, StopReason::Terminal(Some(404)));
    assert_eq!(summary.checkpoint, 4);
    assert_eq!(summary.counters.rate_limited, 1);
    assert_eq!(
        store_requests(&server).await,
        vec!["/store/1", "/store/2", "/store/3", "/store/3", "/store/4"]
    );
    assert_eq!(stored_ids(&dir.path().join("harvest.db")), vec![1, 2, 3]);
    assert_eq!(
        read_marker(&dir.path().join("checkpoint.txt")).unwrap(),
        Some(4)
    );
}

#[tokio::test]
async fn test_rerun_resumes_after_stored_ids() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.uri(), dir.path(), "sqlite");
    mount_store(&server, 1).await;
    mount_store(&server, 2).await;

    harvest_stores(&config).await.unwrap();
    server.reset().await;
    mount_store(&server, 3).await;

    let summary = harvest_stores(&config).await.unwrap();

    assert_eq!(store_requests(&server).await, vec!["/store/3", "/store/4"]);
    assert_eq!(summary.checkpoint, 4);
    assert_eq!(stored_ids(&dir.path().join("harvest.db")), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_join_fetches_history_and_skips_bad_entries() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.uri(), dir.path(), "sqlite");
    let db = dir.path().join("harvest.db");

    {
        let mut storage = SqliteStorage::new(&db).unwrap();
        for store_id in [1, 2, 3] {
            let payload = if store_id == 2 {
                json!({"store": {"storeID": 2}})
            } else {
                store_body(store_id)
            };
            storage.insert(&StoreRecord { store_id, payload }).unwrap();
        }
    }

    Mock::given(method("GET"))
        .and(path("/history"))
        .and(query_param("merchantID", "m-1"))
        .and(query_param("storeID", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [1]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/history"))
        .and(query_param("merchantID", "m-3"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let summary = harvest_purchases(&config).await.unwrap();

    assert_eq!(summary.stop, StopReason::InputExhausted);
    assert_eq!(summary.checkpoint, 3);
    assert_eq!(summary.counters.succeeded, 1);
    assert_eq!(summary.counters.skipped, 2);

    // Entry 2 has no merchant id and is never requested
    let history_calls = server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == "/history")
        .count();
    assert_eq!(history_calls, 2);

    let storage = SqliteStorage::new(&db).unwrap();
    assert_eq!(storage.count_purchases().unwrap(), 1);
    assert_eq!(
        storage.purchase_records().unwrap(),
        vec![PurchaseRecord {
            store_id: 1,
            merchant_id: "m-1".to_string(),
            payload: json!({"items": [1]}),
        }]
    );
    assert_eq!(
        read_marker(&dir.path().join("purchase_checkpoint.txt")).unwrap(),
        Some(3)
    );
}

#[tokio::test]
async fn test_json_backend_full_harvest() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.uri(), dir.path(), "json");
    mount_store(&server, 1).await;
    mount_store(&server, 2).await;
    Mock::given(method("GET"))
        .and(path_regex("^/history$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let stores = harvest_stores(&config).await.unwrap();
    let purchases = harvest_purchases(&config).await.unwrap();

    assert_eq!(stores.checkpoint, 3);
    assert_eq!(purchases.checkpoint, 2);

    let saved_stores: Vec<StoreRecord> = load_array(&dir.path().join("stores.json")).unwrap();
    assert_eq!(saved_stores.len(), 2);
    assert_eq!(saved_stores[1].payload, store_body(2));

    let saved_purchases: Vec<PurchaseRecord> =
        load_array(&dir.path().join("purchases.json")).unwrap();
    let merchants: Vec<&str> = saved_purchases
        .iter()
        .map(|r| r.merchant_id.as_str())
        .collect();
    assert_eq!(merchants, vec!["m-1", "m-2"]);
}
