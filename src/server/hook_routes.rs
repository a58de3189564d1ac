//! Internal routes for the marketplace itself.
//!
//! These are only mounted when a completion hook secret is configured, and
//! every call must present that secret in the x-hook-secret header.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::warn;

use super::download_routes::download_error_response;
use crate::downloads::CompletionSummary;
use crate::server::state::ServerState;

/// Header carrying the completion hook shared secret.
pub const HEADER_HOOK_SECRET_KEY: &str = "x-hook-secret";

#[derive(Debug, Serialize)]
pub struct GrantedItemResponse {
    pub line_item_id: String,
    pub access_token: String,
}

/// Response for POST /orders/{order_id}/completed
#[derive(Debug, Serialize)]
pub struct OrderCompletedResponse {
    pub granted: Vec<GrantedItemResponse>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

impl From<CompletionSummary> for OrderCompletedResponse {
    fn from(summary: CompletionSummary) -> Self {
        OrderCompletedResponse {
            granted: summary
                .granted
                .into_iter()
                .map(|grant| GrantedItemResponse {
                    line_item_id: grant.line_item_id,
                    access_token: grant.access_token,
                })
                .collect(),
            skipped: summary.skipped,
            failed: summary.failed,
        }
    }
}

/// POST /orders/{order_id}/completed - The marketplace reports that an order
/// reached the completed state.
async fn order_completed(
    State(state): State<ServerState>,
    Path(order_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let expected = match state.config.completion_hook_secret.as_deref() {
        Some(secret) => secret,
        None => return StatusCode::UNAUTHORIZED.into_response(),
    };
    let presented = headers
        .get(HEADER_HOOK_SECRET_KEY)
        .and_then(|value| value.to_str().ok());
    if presented != Some(expected) {
        warn!("Completion hook for order {} presented a missing or wrong secret", order_id);
        return StatusCode::UNAUTHORIZED.into_response();
    }

    match state.download_manager.on_order_completed(&order_id) {
        Ok(summary) => Json(OrderCompletedResponse::from(summary)).into_response(),
        Err(e) => download_error_response(e),
    }
}

/// Build the internal marketplace hook routes.
///
/// - POST /orders/{order_id}/completed
pub fn hook_routes() -> Router<ServerState> {
    Router::new().route("/orders/{order_id}/completed", post(order_completed))
}
