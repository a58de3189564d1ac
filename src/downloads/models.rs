//! Data models for download grants and their audit trail.

use serde::{Deserialize, Serialize};

/// Download allowance attached to a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Quota {
    Unlimited,
    Bounded(u32),
}

impl Quota {
    /// Maps the nullable limit column, NULL meaning unlimited.
    pub fn from_limit(limit: Option<u32>) -> Self {
        match limit {
            Some(limit) => Quota::Bounded(limit),
            None => Quota::Unlimited,
        }
    }

    pub fn limit(&self) -> Option<u32> {
        match self {
            Quota::Unlimited => None,
            Quota::Bounded(limit) => Some(*limit),
        }
    }

    /// True when `count` consumed downloads still leave room for one more.
    pub fn allows(&self, count: u32) -> bool {
        match self {
            Quota::Unlimited => true,
            Quota::Bounded(limit) => count < *limit,
        }
    }

    /// Downloads left after `count` consumed ones, None when unlimited.
    pub fn remaining(&self, count: u32) -> Option<u32> {
        match self {
            Quota::Unlimited => None,
            Quota::Bounded(limit) => Some(limit.saturating_sub(count)),
        }
    }
}

/// A buyer's right to download one purchased digital artifact.
#[derive(Debug, Clone)]
pub struct DownloadGrant {
    /// Unique identifier (UUID)
    pub id: String,
    /// Purchased line item this grant covers; at most one grant per item
    pub line_item_id: String,
    /// Buyer entitled to download
    pub owner_id: String,
    /// Digital artifact the grant unlocks
    pub product_id: String,
    /// Unguessable URL-safe secret presented on every download
    pub access_token: String,
    /// How many downloads the purchase allows
    pub quota: Quota,
    /// Successful downloads so far
    pub download_count: u32,
    /// When the grant was issued (Unix timestamp)
    pub issued_at: i64,
    /// Past this instant the grant is permanently inert
    pub expires_at: Option<i64>,
    /// Most recent successful download
    pub last_download_at: Option<i64>,
}

impl DownloadGrant {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    pub fn is_limit_reached(&self) -> bool {
        !self.quota.allows(self.download_count)
    }
}

/// One successful download consumption.
#[derive(Debug, Clone, Serialize)]
pub struct AuditLogEntry {
    pub id: i64,
    pub grant_id: String,
    /// Best-effort client address, never used for authorization
    pub request_ip: Option<String>,
    /// Best-effort client user agent, never used for authorization
    pub request_agent: Option<String>,
    pub occurred_at: i64,
}

/// Client metadata recorded with each consumption.
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Result of the single conditional consume statement.
#[derive(Debug)]
pub enum ConsumeOutcome {
    /// The grant had room; counters were advanced and the attempt audited.
    Consumed(DownloadGrant),
    /// No grant with this token exists.
    NotFound,
    /// The grant expired before the attempt.
    Expired(DownloadGrant),
    /// The quota was already fully consumed.
    LimitReached(DownloadGrant),
}
