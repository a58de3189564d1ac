//! End-to-end tests for the download flow
//!
//! Covers the happy path from order completion to exhausting the
//! download limit, via `/v1/downloads/{token}` and
//! `/v1/downloads/{token}/file`.

mod common;

use common::{
    TestClient, TestServer, BUYER_1_SESSION_TOKEN, ORDER_1_ID, PRODUCT_FONT_PACK_ID,
    PRODUCT_FONT_PACK_LOCATOR, PRODUCT_FONT_PACK_NAME,
};

/// Runs the completion hook and returns the font pack access token
async fn grant_font_pack_token(client: &TestClient) -> String {
    let response = client.complete_order(ORDER_1_ID).await;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    body["granted"][0]["access_token"]
        .as_str()
        .expect("Hook response carried no access token")
        .to_string()
}

// ============================================================================
// Token Info Tests
// ============================================================================

#[tokio::test]
async fn test_download_info_reports_quota_and_expiry() {
    let server = TestServer::spawn().await;
    let client = TestClient::with_session(server.base_url.clone(), BUYER_1_SESSION_TOKEN);
    let token = grant_font_pack_token(&client).await;

    let response = client.download_info(&token).await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["product_id"], PRODUCT_FONT_PACK_ID);
    assert_eq!(body["product_name"], PRODUCT_FONT_PACK_NAME);
    assert_eq!(body["download_count"], 0);
    assert_eq!(body["download_limit"], 3);
    assert_eq!(body["remaining"], 3);
    // The font pack has a 30 day access window, so an expiry must be set
    assert!(body["expires_at"].is_i64());
}

#[tokio::test]
async fn test_download_info_does_not_consume_quota() {
    let server = TestServer::spawn().await;
    let client = TestClient::with_session(server.base_url.clone(), BUYER_1_SESSION_TOKEN);
    let token = grant_font_pack_token(&client).await;

    for _ in 0..5 {
        let response = client.download_info(&token).await;
        assert_eq!(response.status(), 200);
    }

    let body: serde_json::Value = client.download_info(&token).await.json().await.unwrap();
    assert_eq!(body["download_count"], 0);
    assert_eq!(body["remaining"], 3);
}

// ============================================================================
// File Consumption Tests
// ============================================================================

#[tokio::test]
async fn test_download_file_returns_locator_and_counts() {
    let server = TestServer::spawn().await;
    let client = TestClient::with_session(server.base_url.clone(), BUYER_1_SESSION_TOKEN);
    let token = grant_font_pack_token(&client).await;

    let response = client.download_file(&token).await;
    assert_eq!(response.status(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["resource_locator"], PRODUCT_FONT_PACK_LOCATOR);
    assert_eq!(body["download_count"], 1);
    assert_eq!(body["download_limit"], 3);
    assert_eq!(body["remaining"], 2);
}

#[tokio::test]
async fn test_download_limit_is_enforced() {
    let server = TestServer::spawn().await;
    let client = TestClient::with_session(server.base_url.clone(), BUYER_1_SESSION_TOKEN);
    let token = grant_font_pack_token(&client).await;

    for expected_remaining in [2, 1, 0] {
        let response = client.download_file(&token).await;
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["remaining"], expected_remaining);
    }

    // The fourth attempt hits the limit
    let response = client.download_file(&token).await;
    assert_eq!(response.status(), 429);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Download limit reached");
    assert_eq!(body["download_count"], 3);
    assert_eq!(body["download_limit"], 3);

    // Info reports the same state once the limit is reached
    let response = client.download_info(&token).await;
    assert_eq!(response.status(), 429);
}

#[tokio::test]
async fn test_download_file_redirects_when_asked() {
    let server = TestServer::spawn().await;
    let client = TestClient::with_session(server.base_url.clone(), BUYER_1_SESSION_TOKEN);
    let token = grant_font_pack_token(&client).await;

    let response = client.download_file_redirect(&token).await;
    assert_eq!(response.status(), 303);
    assert_eq!(
        response.headers()["location"],
        PRODUCT_FONT_PACK_LOCATOR
    );

    // The redirect consumed one download like any other fetch
    let response = client.download_file(&token).await;
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["download_count"], 2);
}
