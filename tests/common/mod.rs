//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestServer, TestClient, BUYER_1_SESSION_TOKEN, ORDER_1_ID};
//! use reqwest::StatusCode;
//!
//! #[tokio::test]
//! async fn test_list_order_downloads() {
//!     let server = TestServer::spawn().await;
//!     let client = TestClient::with_session(server.base_url.clone(), BUYER_1_SESSION_TOKEN);
//!
//!     let response = client.order_downloads(ORDER_1_ID).await;
//!     assert_eq!(response.status(), StatusCode::OK);
//! }
//! ```

mod client;
mod constants;
mod fixtures;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
pub use server::TestServer;

// Keep fixtures internal - only accessed via TestServer::spawn()
#[allow(unused_imports)]
pub(crate) use fixtures::create_test_data_dir;
