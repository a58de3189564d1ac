//! Download Manager - the entitlement rules around download grants.
//!
//! Grant lifecycle:
//! 1. Marketplace reports an order as completed → one grant per digital item
//! 2. Buyer validates or consumes the grant by access token
//! 3. Consumption decrements quota and leaves an audit entry, atomically
//! 4. Buyer can rotate the token at any time without losing counters

use std::sync::Arc;
use std::time::SystemTime;

use anyhow::Context;
use rand::Rng;
use rand_distr::Alphanumeric;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::grant_store::GrantStore;
use super::models::{AuditLogEntry, ConsumeOutcome, DownloadGrant, Quota, RequestMeta};
use crate::catalog::{CatalogStore, OrderStatus, Product, ProductKind};

/// Errors that can occur during download entitlement operations.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("Download not found")]
    NotFound,

    #[error("Access denied")]
    AccessDenied,

    #[error("Download access expired")]
    Expired,

    #[error("Download limit reached ({count}/{limit})")]
    LimitReached { count: u32, limit: u32 },

    #[error("Order is not completed")]
    OrderNotCompleted,

    #[error("Invalid order status: {}", .status.as_str())]
    InvalidState { status: OrderStatus },
}

/// Configuration for the DownloadManager.
#[derive(Clone)]
pub struct DownloadManagerConfig {
    /// How many audit entries to attach per grant in order listings.
    pub audit_tail_len: usize,
}

impl Default for DownloadManagerConfig {
    fn default() -> Self {
        Self { audit_tail_len: 10 }
    }
}

/// A grant that passed every access check, with the product it covers.
pub struct ValidatedGrant {
    pub grant: DownloadGrant,
    pub product: Product,
}

/// The result of a consumed download.
#[derive(Debug, Clone)]
pub struct DownloadReceipt {
    /// Where the product's file lives.
    pub resource_locator: String,
    /// Downloads used so far, including this one.
    pub download_count: u32,
    pub quota: Quota,
    /// Downloads left, `None` for unlimited quotas.
    pub remaining: Option<u32>,
}

/// Per-line-item outcome of processing an order completion.
#[derive(Debug, Default)]
pub struct CompletionSummary {
    /// Grants covering the order's digital items, freshly issued or pre-existing.
    pub granted: Vec<DownloadGrant>,
    /// Line items that need no grant (non-digital products).
    pub skipped: Vec<String>,
    /// Line items whose grant could not be issued.
    pub failed: Vec<String>,
}

/// One grant in an order's download listing.
#[derive(Debug)]
pub struct OrderDownloadEntry {
    pub grant: DownloadGrant,
    pub product_name: Option<String>,
    pub is_expired: bool,
    pub is_limit_reached: bool,
    /// Most recent downloads, newest first.
    pub audit_tail: Vec<AuditLogEntry>,
}

/// Enforces the entitlement rules between the marketplace catalog and the
/// grant store.
pub struct DownloadManager {
    grants: Arc<dyn GrantStore>,
    catalog: Arc<dyn CatalogStore>,
    config: DownloadManagerConfig,
}

impl DownloadManager {
    /// Create a new DownloadManager.
    pub fn new(
        grants: Arc<dyn GrantStore>,
        catalog: Arc<dyn CatalogStore>,
        config: DownloadManagerConfig,
    ) -> Self {
        Self {
            grants,
            catalog,
            config,
        }
    }

    /// Issues a download grant for a purchased line item, or returns the
    /// existing one. `Ok(None)` means the item's product is not digital and
    /// no grant applies.
    ///
    /// Quota and expiry are copied from the product at issuance time, so
    /// later product edits never touch already-issued grants.
    pub fn issue_for_line_item(
        &self,
        line_item_id: &str,
    ) -> Result<Option<DownloadGrant>, DownloadError> {
        let line_item = self
            .catalog
            .get_line_item(line_item_id)?
            .ok_or(DownloadError::NotFound)?;
        let product = self
            .catalog
            .get_product(&line_item.product_id)?
            .ok_or(DownloadError::NotFound)?;
        if product.kind != ProductKind::Digital {
            debug!(
                "Line item {} is for non-digital product {}, no grant to issue",
                line_item_id, product.id
            );
            return Ok(None);
        }
        let order = self
            .catalog
            .get_order(&line_item.order_id)?
            .ok_or(DownloadError::NotFound)?;

        let now = now();
        let grant_id = Uuid::new_v4().to_string();
        let grant = DownloadGrant {
            id: grant_id.clone(),
            line_item_id: line_item.id,
            owner_id: order.buyer_id,
            product_id: product.id,
            access_token: generate_access_token(),
            quota: Quota::from_limit(product.download_limit),
            download_count: 0,
            issued_at: now,
            expires_at: product
                .access_window_days
                .map(|days| now + i64::from(days) * 86_400),
            last_download_at: None,
        };
        let stored = self.grants.insert_grant_if_absent(grant)?;
        if stored.id == grant_id {
            info!(
                "Issued download grant {} for line item {}",
                stored.id, line_item_id
            );
        } else {
            debug!(
                "Line item {} already has download grant {}",
                line_item_id, stored.id
            );
        }
        Ok(Some(stored))
    }

    /// Checks whether `access_token` currently entitles a download, without
    /// consuming anything. Checks run in a fixed order and the first failure
    /// wins: unknown token, ownership (only when `owner_id` is given),
    /// expiry, quota, and finally the live order status.
    pub fn validate(
        &self,
        access_token: &str,
        owner_id: Option<&str>,
    ) -> Result<ValidatedGrant, DownloadError> {
        let grant = self
            .grants
            .get_grant_by_token(access_token)?
            .ok_or(DownloadError::NotFound)?;
        if let Some(owner_id) = owner_id {
            if grant.owner_id != owner_id {
                return Err(DownloadError::AccessDenied);
            }
        }
        if grant.is_expired(now()) {
            return Err(DownloadError::Expired);
        }
        if grant.is_limit_reached() {
            return Err(limit_error(&grant));
        }
        let product = self.require_completed_order(&grant)?;
        Ok(ValidatedGrant { grant, product })
    }

    /// Consumes one download: runs the same checks as [`Self::validate`],
    /// then advances the counter and appends the audit entry in a single
    /// storage transaction. Refused attempts leave no trace.
    pub fn consume(
        &self,
        access_token: &str,
        owner_id: Option<&str>,
        meta: &RequestMeta,
    ) -> Result<DownloadReceipt, DownloadError> {
        let validated = self.validate(access_token, owner_id)?;
        let resource_locator = validated
            .product
            .resource_locator
            .clone()
            .with_context(|| format!("Product {} has no resource locator", validated.product.id))?;

        match self.grants.consume_download(access_token, meta)? {
            ConsumeOutcome::Consumed(grant) => {
                info!(
                    "Grant {} consumed a download, count is now {}",
                    grant.id, grant.download_count
                );
                Ok(DownloadReceipt {
                    resource_locator,
                    download_count: grant.download_count,
                    quota: grant.quota,
                    remaining: grant.quota.remaining(grant.download_count),
                })
            }
            ConsumeOutcome::NotFound => Err(DownloadError::NotFound),
            ConsumeOutcome::Expired(_) => Err(DownloadError::Expired),
            ConsumeOutcome::LimitReached(grant) => Err(limit_error(&grant)),
        }
    }

    /// Replaces the grant's access token with a fresh one. The old token
    /// stops resolving immediately; counters and expiry are untouched.
    pub fn rotate(
        &self,
        line_item_id: &str,
        owner_id: &str,
    ) -> Result<DownloadGrant, DownloadError> {
        let grant = self
            .grants
            .get_grant_by_line_item(line_item_id)?
            .ok_or(DownloadError::NotFound)?;
        if grant.owner_id != owner_id {
            return Err(DownloadError::AccessDenied);
        }
        let new_token = generate_access_token();
        self.grants.replace_access_token(&grant.id, &new_token)?;
        info!("Rotated access token of grant {}", grant.id);
        Ok(DownloadGrant {
            access_token: new_token,
            ..grant
        })
    }

    /// Reacts to an order reaching COMPLETED: issues a grant for each digital
    /// line item. One item failing does not stop the others, and re-running
    /// on the same order just returns the already-issued grants.
    pub fn on_order_completed(&self, order_id: &str) -> Result<CompletionSummary, DownloadError> {
        let order = self
            .catalog
            .get_order(order_id)?
            .ok_or(DownloadError::NotFound)?;
        if order.status != OrderStatus::Completed {
            return Err(DownloadError::InvalidState {
                status: order.status,
            });
        }

        let mut summary = CompletionSummary::default();
        for line_item in self.catalog.get_order_line_items(order_id)? {
            match self.issue_for_line_item(&line_item.id) {
                Ok(Some(grant)) => summary.granted.push(grant),
                Ok(None) => summary.skipped.push(line_item.id),
                Err(e) => {
                    warn!(
                        "Failed to issue a grant for line item {}: {}",
                        line_item.id, e
                    );
                    summary.failed.push(line_item.id);
                }
            }
        }

        info!(
            "Processed completion of order {}: {} granted, {} skipped, {} failed",
            order_id,
            summary.granted.len(),
            summary.skipped.len(),
            summary.failed.len()
        );
        Ok(summary)
    }

    /// All download grants of an order, with product names and recent audit
    /// entries. Only the order's buyer may list them.
    pub fn order_downloads(
        &self,
        order_id: &str,
        owner_id: &str,
    ) -> Result<Vec<OrderDownloadEntry>, DownloadError> {
        let order = self
            .catalog
            .get_order(order_id)?
            .ok_or(DownloadError::NotFound)?;
        if order.buyer_id != owner_id {
            return Err(DownloadError::AccessDenied);
        }

        let line_item_ids: Vec<String> = self
            .catalog
            .get_order_line_items(order_id)?
            .into_iter()
            .map(|line_item| line_item.id)
            .collect();
        let grants = self.grants.get_grants_by_line_items(&line_item_ids)?;

        let now = now();
        let mut entries = Vec::with_capacity(grants.len());
        for grant in grants {
            let product_name = self
                .catalog
                .get_product(&grant.product_id)?
                .map(|product| product.name);
            let audit_tail = self
                .grants
                .get_audit_tail(&grant.id, self.config.audit_tail_len)?;
            entries.push(OrderDownloadEntry {
                is_expired: grant.is_expired(now),
                is_limit_reached: grant.is_limit_reached(),
                product_name,
                audit_tail,
                grant,
            });
        }
        Ok(entries)
    }

    fn require_completed_order(&self, grant: &DownloadGrant) -> Result<Product, DownloadError> {
        let line_item = self
            .catalog
            .get_line_item(&grant.line_item_id)?
            .ok_or(DownloadError::NotFound)?;
        let order = self
            .catalog
            .get_order(&line_item.order_id)?
            .ok_or(DownloadError::NotFound)?;
        if order.status != OrderStatus::Completed {
            return Err(DownloadError::OrderNotCompleted);
        }
        let product = self
            .catalog
            .get_product(&grant.product_id)?
            .ok_or(DownloadError::NotFound)?;
        Ok(product)
    }
}

fn limit_error(grant: &DownloadGrant) -> DownloadError {
    DownloadError::LimitReached {
        count: grant.download_count,
        limit: grant.quota.limit().unwrap_or(grant.download_count),
    }
}

fn generate_access_token() -> String {
    let rng = rand::rng();
    rng.sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

/// Current timestamp in seconds.
fn now() -> i64 {
    SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}
