//! HTTP client for end-to-end tests
//!
//! This module provides a high-level HTTP client that wraps reqwest
//! and provides methods for all downloads-server endpoints.
//!
//! When API routes or request formats change, update only this file.

use super::constants::*;
use bancarella_downloads_server::server::HEADER_HOOK_SECRET_KEY;
use reqwest::Response;
use serde_json::json;
use std::time::Duration;

/// HTTP test client that presents a fixed marketplace session token
pub struct TestClient {
    /// The underlying reqwest client (public for custom requests in tests)
    pub client: reqwest::Client,
    /// The base URL of the test server
    pub base_url: String,
    /// Session token sent in the Authorization header, if any
    session_token: Option<String>,
}

impl TestClient {
    /// Creates a client without a session
    ///
    /// Use this for testing unauthenticated access.
    /// For most tests, use `with_session()` instead.
    pub fn new(base_url: String) -> Self {
        // The file endpoint can answer with a redirect to the CDN; tests
        // assert on the redirect itself, so never follow it.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to build reqwest client");

        Self {
            client,
            base_url,
            session_token: None,
        }
    }

    /// Creates a client that authenticates as the given buyer session
    ///
    /// Sessions are created by the marketplace, so tests just present one
    /// of the tokens seeded by the fixtures (e.g. `BUYER_1_SESSION_TOKEN`).
    pub fn with_session(base_url: String, session_token: &str) -> Self {
        let mut client = Self::new(base_url);
        client.session_token = Some(session_token.to_string());
        client
    }

    /// Attaches the session token to a request, if the client has one
    fn apply_session(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.session_token {
            Some(token) => request.header("Authorization", token),
            None => request,
        }
    }

    // ========================================================================
    // Server Endpoints
    // ========================================================================

    /// GET /
    pub async fn home(&self) -> Response {
        self.apply_session(self.client.get(format!("{}/", self.base_url)))
            .send()
            .await
            .expect("Home request failed")
    }

    // ========================================================================
    // Download Endpoints
    // ========================================================================

    /// GET /v1/downloads/{token}
    pub async fn download_info(&self, token: &str) -> Response {
        self.apply_session(
            self.client
                .get(format!("{}/v1/downloads/{}", self.base_url, token)),
        )
        .send()
        .await
        .expect("Download info request failed")
    }

    /// GET /v1/downloads/{token}/file
    pub async fn download_file(&self, token: &str) -> Response {
        self.apply_session(
            self.client
                .get(format!("{}/v1/downloads/{}/file", self.base_url, token)),
        )
        .send()
        .await
        .expect("Download file request failed")
    }

    /// GET /v1/downloads/{token}/file?redirect=true
    pub async fn download_file_redirect(&self, token: &str) -> Response {
        self.apply_session(self.client.get(format!(
            "{}/v1/downloads/{}/file?redirect=true",
            self.base_url, token
        )))
        .send()
        .await
        .expect("Download file request failed")
    }

    /// POST /v1/downloads/regenerate
    pub async fn regenerate_token(&self, line_item_id: &str) -> Response {
        self.apply_session(
            self.client
                .post(format!("{}/v1/downloads/regenerate", self.base_url)),
        )
        .json(&json!({ "line_item_id": line_item_id }))
        .send()
        .await
        .expect("Regenerate request failed")
    }

    // ========================================================================
    // Order Endpoints
    // ========================================================================

    /// GET /v1/orders/{order_id}/downloads
    pub async fn order_downloads(&self, order_id: &str) -> Response {
        self.apply_session(self.client.get(format!(
            "{}/v1/orders/{}/downloads",
            self.base_url, order_id
        )))
        .send()
        .await
        .expect("Order downloads request failed")
    }

    // ========================================================================
    // Marketplace Hook Endpoints
    // ========================================================================

    /// POST /internal/orders/{order_id}/completed with the test hook secret
    pub async fn complete_order(&self, order_id: &str) -> Response {
        self.complete_order_with_secret(order_id, Some(HOOK_SECRET))
            .await
    }

    /// POST /internal/orders/{order_id}/completed with a custom secret header
    ///
    /// Pass `None` to send no secret at all.
    pub async fn complete_order_with_secret(
        &self,
        order_id: &str,
        secret: Option<&str>,
    ) -> Response {
        let mut request = self.client.post(format!(
            "{}/internal/orders/{}/completed",
            self.base_url, order_id
        ));
        if let Some(secret) = secret {
            request = request.header(HEADER_HOOK_SECRET_KEY, secret);
        }
        request
            .send()
            .await
            .expect("Completion hook request failed")
    }
}
