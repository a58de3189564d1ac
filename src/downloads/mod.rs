//! Download entitlement feature.
//!
//! A completed marketplace order turns each digital line item into a download
//! grant: a secret access token bound to the buyer, carrying the quota and
//! expiry the product was configured with at purchase time. Buyers redeem the
//! token to download, can list an order's grants, and can rotate a token
//! without losing their remaining quota.

mod grant_store;
mod manager;
mod models;
mod schema;

pub use grant_store::{GrantStore, SqliteGrantStore};
pub use manager::{
    CompletionSummary, DownloadError, DownloadManager, DownloadManagerConfig, DownloadReceipt,
    OrderDownloadEntry, ValidatedGrant,
};
pub use models::{AuditLogEntry, ConsumeOutcome, DownloadGrant, Quota, RequestMeta};
pub use schema::DOWNLOADS_VERSIONED_SCHEMAS;
