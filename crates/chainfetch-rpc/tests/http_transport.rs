//! `HttpLogClient` against a mockito JSON-RPC endpoint.

use std::io::Write;
use std::time::Duration;

use chainfetch_core::{LogTransport, TransportError};
use chainfetch_rpc::{HttpClientConfig, HttpLogClient, RetryConfig};
use mockito::Matcher;
use serde_json::json;

fn client(url: String) -> HttpLogClient {
    HttpLogClient::new(
        url,
        HttpClientConfig {
            retry: RetryConfig {
                max_retries: 3,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
                multiplier: 2.0,
            },
            request_timeout: Duration::from_secs(5),
        },
    )
    .unwrap()
}

fn result(value: serde_json::Value) -> String {
    json!({"jsonrpc": "2.0", "id": 1, "result": value}).to_string()
}

#[tokio::test]
async fn block_number_parses_hex_quantity() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({"method": "eth_blockNumber"})))
        .with_header("content-type", "application/json")
        .with_body(result(json!("0x112a880")))
        .expect(1)
        .create_async()
        .await;

    assert_eq!(client(server.url()).block_number().await.unwrap(), 18_000_000);
    m.assert_async().await;
}

#[tokio::test]
async fn get_logs_sends_filter_and_parses_entries() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("POST", "/")
        .match_body(Matcher::PartialJson(json!({
            "method": "eth_getLogs",
            "params": [{"address": "0xabc", "fromBlock": "0x64", "toBlock": "0xc8"}]
        })))
        .with_header("content-type", "application/json")
        .with_body(result(json!([{
            "address": "0xABC",
            "topics": [],
            "data": "0x",
            "blockNumber": "0x65",
            "transactionHash": "0x01",
            "logIndex": "0x0"
        }])))
        .expect(1)
        .create_async()
        .await;

    let logs = client(server.url()).get_logs("0xabc", 100, 200).await.unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].block_number, 101);
    assert_eq!(logs[0].address, "0xabc");
    m.assert_async().await;
}

#[tokio::test]
async fn rpc_error_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("POST", "/")
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "error": {"code": -32005, "message": "query returned more than 10000 results"}
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let err = client(server.url()).get_logs("0xabc", 0, 1_000_000).await.unwrap_err();
    assert!(matches!(err, TransportError::Rpc { code: -32005, .. }));
    m.assert_async().await;
}

#[tokio::test]
async fn server_errors_are_retried() {
    let mut server = mockito::Server::new_async().await;
    // Mocks with hits still missing are served first.
    let unavailable = server
        .mock("POST", "/")
        .with_status(503)
        .with_body("unavailable")
        .expect(2)
        .create_async()
        .await;
    let recovered = server
        .mock("POST", "/")
        .with_header("content-type", "application/json")
        .with_body(result(json!("0x1")))
        .expect(1)
        .create_async()
        .await;

    assert_eq!(client(server.url()).block_number().await.unwrap(), 1);
    unavailable.assert_async().await;
    recovered.assert_async().await;
}

#[tokio::test]
async fn retries_are_bounded() {
    let mut server = mockito::Server::new_async().await;
    // first try plus three retries
    let m = server
        .mock("POST", "/")
        .with_status(502)
        .with_body("bad gateway")
        .expect(4)
        .create_async()
        .await;

    let err = client(server.url()).block_number().await.unwrap_err();
    assert!(matches!(err, TransportError::Http(_)));
    m.assert_async().await;
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("POST", "/")
        .with_status(401)
        .with_body("unauthorized")
        .expect(1)
        .create_async()
        .await;

    let err = client(server.url()).block_number().await.unwrap_err();
    assert!(!err.is_retryable());
    m.assert_async().await;
}

#[tokio::test]
async fn slow_response_times_out() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("POST", "/")
        .with_header("content-type", "application/json")
        .with_chunked_body(|w| {
            std::thread::sleep(Duration::from_millis(500));
            w.write_all(result(json!("0x1")).as_bytes())
        })
        .expect(1)
        .create_async()
        .await;

    let client = HttpLogClient::new(
        server.url(),
        HttpClientConfig {
            retry: RetryConfig::none(),
            request_timeout: Duration::from_millis(50),
        },
    )
    .unwrap();

    let err = client.block_number().await.unwrap_err();
    assert!(matches!(err, TransportError::Timeout { ms: 50 }));
    m.assert_async().await;
}
