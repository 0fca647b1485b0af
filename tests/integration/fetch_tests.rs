//! Response classification against a live HTTP server

use crate::test_config;
use serde_json::json;
use storefront_harvest::crawler::{FetchClient, FetchOutcome, HttpFetchClient};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn client_for(server: &MockServer) -> HttpFetchClient {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.uri(), dir.path(), "sqlite");
    HttpFetchClient::new(&config.api).unwrap()
}

#[tokio::test]
async fn test_store_success_sends_query_and_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/store/7"))
        .and(query_param("serviceSubtype", "fine"))
        .and(header("X-Client", "harvest-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"store": {"storeID": 7}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let outcome = client.fetch_store(7).await;

    assert_eq!(outcome, FetchOutcome::Success(json!({"store": {"storeID": 7}})));
}

#[tokio::test]
async fn test_rate_limit_and_terminal_statuses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/store/1"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/store/2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server).await;

    assert_eq!(
        client.fetch_store(1).await,
        FetchOutcome::RateLimited { status: 403 }
    );
    assert!(matches!(
        client.fetch_store(2).await,
        FetchOutcome::Terminal {
            status: Some(500),
            ..
        }
    ));
    // Unmocked ids fall through to wiremock's 404
    assert!(matches!(
        client.fetch_store(3).await,
        FetchOutcome::Terminal {
            status: Some(404),
            ..
        }
    ));
}

#[tokio::test]
async fn test_non_json_body_is_terminal_without_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/store/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;

    assert!(matches!(
        client.fetch_store(1).await,
        FetchOutcome::Terminal { status: None, .. }
    ));
}

#[tokio::test]
async fn test_purchase_history_query_parameters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/history"))
        .and(query_param("merchantID", "m-42"))
        .and(query_param("storeID", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [{"sku": "a"}]})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let outcome = client.fetch_purchase_history("m-42", 42).await;

    assert_eq!(
        outcome,
        FetchOutcome::Success(json!({"items": [{"sku": "a"}]}))
    );
}

#[tokio::test]
async fn test_unreachable_server_is_terminal() {
    let server = MockServer::start().await;
    let client = client_for(&server).await;
    drop(server);

    assert!(matches!(
        client.fetch_store(1).await,
        FetchOutcome::Terminal { status: None, .. }
    ));
}
