//! Buyer-facing download routes.
//!
//! Provides endpoints for:
//! - Inspecting a download token without spending a download
//! - Redeeming a token for the product's file locator
//! - Listing the downloads of an order
//! - Regenerating a leaked or shared token

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::warn;

use crate::downloads::{
    AuditLogEntry, DownloadError, DownloadGrant, DownloadReceipt, OrderDownloadEntry, RequestMeta,
    ValidatedGrant,
};
use crate::server::session::Session;
use crate::server::state::{GuardedDownloadManager, ServerState};

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct DownloadFileQuery {
    /// When true, answer with a redirect to the file instead of JSON.
    #[serde(default)]
    pub redirect: bool,
}

#[derive(Debug, Deserialize)]
pub struct RegenerateTokenBody {
    pub line_item_id: String,
}

#[derive(Debug, Serialize)]
pub struct DownloadInfoResponse {
    pub product_id: String,
    pub product_name: String,
    pub download_count: u32,
    pub download_limit: Option<u32>,
    pub remaining: Option<u32>,
    pub expires_at: Option<i64>,
}

impl From<ValidatedGrant> for DownloadInfoResponse {
    fn from(validated: ValidatedGrant) -> Self {
        DownloadInfoResponse {
            product_id: validated.product.id,
            product_name: validated.product.name,
            download_count: validated.grant.download_count,
            download_limit: validated.grant.quota.limit(),
            remaining: validated
                .grant
                .quota
                .remaining(validated.grant.download_count),
            expires_at: validated.grant.expires_at,
        }
    }
}

/// Response for GET /downloads/{token}/file
#[derive(Debug, Serialize)]
pub struct DownloadFileResponse {
    pub resource_locator: String,
    pub download_count: u32,
    pub download_limit: Option<u32>,
    pub remaining: Option<u32>,
}

impl From<DownloadReceipt> for DownloadFileResponse {
    fn from(receipt: DownloadReceipt) -> Self {
        DownloadFileResponse {
            resource_locator: receipt.resource_locator,
            download_count: receipt.download_count,
            download_limit: receipt.quota.limit(),
            remaining: receipt.remaining,
        }
    }
}

/// Body of a 429 when the quota is used up.
#[derive(Debug, Serialize)]
pub struct LimitReachedResponse {
    pub error: String,
    pub download_count: u32,
    pub download_limit: u32,
}

/// Response for POST /downloads/regenerate
#[derive(Debug, Serialize)]
pub struct RegeneratedTokenResponse {
    pub line_item_id: String,
    pub access_token: String,
    pub download_count: u32,
    pub download_limit: Option<u32>,
    pub expires_at: Option<i64>,
}

impl From<DownloadGrant> for RegeneratedTokenResponse {
    fn from(grant: DownloadGrant) -> Self {
        RegeneratedTokenResponse {
            line_item_id: grant.line_item_id,
            access_token: grant.access_token,
            download_count: grant.download_count,
            download_limit: grant.quota.limit(),
            expires_at: grant.expires_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderDownloadsResponse {
    pub downloads: Vec<OrderDownloadItem>,
}

#[derive(Debug, Serialize)]
pub struct OrderDownloadItem {
    pub line_item_id: String,
    pub product_id: String,
    pub product_name: Option<String>,
    pub access_token: String,
    pub download_count: u32,
    pub download_limit: Option<u32>,
    pub expires_at: Option<i64>,
    pub is_expired: bool,
    pub is_limit_reached: bool,
    /// Most recent downloads, newest first.
    pub recent_downloads: Vec<AuditEntryResponse>,
}

impl From<OrderDownloadEntry> for OrderDownloadItem {
    fn from(entry: OrderDownloadEntry) -> Self {
        OrderDownloadItem {
            line_item_id: entry.grant.line_item_id,
            product_id: entry.grant.product_id,
            product_name: entry.product_name,
            access_token: entry.grant.access_token,
            download_count: entry.grant.download_count,
            download_limit: entry.grant.quota.limit(),
            expires_at: entry.grant.expires_at,
            is_expired: entry.is_expired,
            is_limit_reached: entry.is_limit_reached,
            recent_downloads: entry
                .audit_tail
                .into_iter()
                .map(AuditEntryResponse::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditEntryResponse {
    pub occurred_at: i64,
    pub request_ip: Option<String>,
    pub request_agent: Option<String>,
}

impl From<AuditLogEntry> for AuditEntryResponse {
    fn from(entry: AuditLogEntry) -> Self {
        AuditEntryResponse {
            occurred_at: entry.occurred_at,
            request_ip: entry.request_ip,
            request_agent: entry.request_agent,
        }
    }
}

// =============================================================================
// Error Mapping
// =============================================================================

pub(super) fn download_error_response(err: DownloadError) -> Response {
    match err {
        DownloadError::NotFound => StatusCode::NOT_FOUND.into_response(),
        DownloadError::AccessDenied => StatusCode::FORBIDDEN.into_response(),
        DownloadError::Expired => {
            (StatusCode::GONE, "Download access expired").into_response()
        }
        DownloadError::LimitReached { count, limit } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(LimitReachedResponse {
                error: "Download limit reached".to_string(),
                download_count: count,
                download_limit: limit,
            }),
        )
            .into_response(),
        DownloadError::OrderNotCompleted => {
            (StatusCode::CONFLICT, "Order is not completed").into_response()
        }
        DownloadError::InvalidState { .. } => {
            (StatusCode::CONFLICT, err.to_string()).into_response()
        }
        DownloadError::Store(e) => {
            warn!("Download operation failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Client IP comes from x-forwarded-for when a proxy set it, else from the
/// socket peer address.
fn request_meta(headers: &HeaderMap, peer_addr: &SocketAddr) -> RequestMeta {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());
    RequestMeta {
        ip: Some(forwarded.unwrap_or_else(|| peer_addr.ip().to_string())),
        user_agent,
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /downloads/{token} - Inspect a token's state without consuming it.
/// Works without a session; with one, the session's buyer must own the grant.
async fn get_download_info(
    session: Option<Session>,
    State(manager): State<GuardedDownloadManager>,
    Path(token): Path<String>,
) -> Response {
    let owner_id = session.as_ref().map(|s| s.buyer_id.as_str());
    match manager.validate(&token, owner_id) {
        Ok(validated) => Json(DownloadInfoResponse::from(validated)).into_response(),
        Err(e) => download_error_response(e),
    }
}

/// GET /downloads/{token}/file - Consume one download
async fn download_file(
    session: Session,
    State(manager): State<GuardedDownloadManager>,
    Path(token): Path<String>,
    Query(query): Query<DownloadFileQuery>,
    ConnectInfo(peer_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let meta = request_meta(&headers, &peer_addr);
    match manager.consume(&token, Some(&session.buyer_id), &meta) {
        Ok(receipt) => {
            if query.redirect {
                Redirect::to(&receipt.resource_locator).into_response()
            } else {
                Json(DownloadFileResponse::from(receipt)).into_response()
            }
        }
        Err(e) => download_error_response(e),
    }
}

/// GET /orders/{order_id}/downloads - List an order's download grants
async fn get_order_downloads(
    session: Session,
    State(manager): State<GuardedDownloadManager>,
    Path(order_id): Path<String>,
) -> Response {
    match manager.order_downloads(&order_id, &session.buyer_id) {
        Ok(entries) => Json(OrderDownloadsResponse {
            downloads: entries.into_iter().map(OrderDownloadItem::from).collect(),
        })
        .into_response(),
        Err(e) => download_error_response(e),
    }
}

/// POST /downloads/regenerate - Swap the grant's token for a fresh one
async fn regenerate_token(
    session: Session,
    State(manager): State<GuardedDownloadManager>,
    Json(body): Json<RegenerateTokenBody>,
) -> Response {
    match manager.rotate(&body.line_item_id, &session.buyer_id) {
        Ok(grant) => Json(RegeneratedTokenResponse::from(grant)).into_response(),
        Err(e) => download_error_response(e),
    }
}

// =============================================================================
// Router Construction
// =============================================================================

/// Build the buyer-facing download routes.
///
/// - GET /downloads/{token}
/// - GET /downloads/{token}/file
/// - POST /downloads/regenerate
/// - GET /orders/{order_id}/downloads
pub fn download_routes() -> Router<ServerState> {
    Router::new()
        .route("/downloads/{token}", get(get_download_info))
        .route("/downloads/{token}/file", get(download_file))
        .route("/downloads/regenerate", post(regenerate_token))
        .route("/orders/{order_id}/downloads", get(get_order_downloads))
}
