use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};

use super::models::{AuditLogEntry, ConsumeOutcome, DownloadGrant, Quota, RequestMeta};
use super::schema::DOWNLOADS_VERSIONED_SCHEMAS;
use crate::sqlite_persistence::open_database;

/// Persistence for download grants and their audit trail.
pub trait GrantStore: Send + Sync {
    // === Grants ===

    /// Inserts `grant` unless one already exists for its line item, and
    /// returns the stored grant either way.
    fn insert_grant_if_absent(&self, grant: DownloadGrant) -> Result<DownloadGrant>;

    /// Looks up a grant by access token.
    fn get_grant_by_token(&self, access_token: &str) -> Result<Option<DownloadGrant>>;

    /// Looks up a grant by the line item it covers.
    fn get_grant_by_line_item(&self, line_item_id: &str) -> Result<Option<DownloadGrant>>;

    /// Grants covering any of `line_item_ids`, oldest first.
    fn get_grants_by_line_items(&self, line_item_ids: &[String]) -> Result<Vec<DownloadGrant>>;

    /// Swaps the grant's access token in place. Counters are untouched and
    /// the previous token stops resolving the moment this commits.
    fn replace_access_token(&self, grant_id: &str, new_token: &str) -> Result<()>;

    // === Consumption (atomic) ===

    /// Consumes one download under `access_token` and appends the audit
    /// entry, as a single transaction. Expiry and remaining quota are
    /// re-checked by the update statement itself, so concurrent calls can
    /// never push a grant past its limit.
    fn consume_download(&self, access_token: &str, meta: &RequestMeta) -> Result<ConsumeOutcome>;

    // === Audit log ===

    /// Most recent audit entries for a grant, newest first.
    fn get_audit_tail(&self, grant_id: &str, limit: usize) -> Result<Vec<AuditLogEntry>>;
}

pub struct SqliteGrantStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteGrantStore {
    /// Opens the downloads database, creating it if the file does not
    /// exist yet.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_database(db_path, DOWNLOADS_VERSIONED_SCHEMAS)?;
        Ok(SqliteGrantStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = crate::sqlite_persistence::open_in_memory(DOWNLOADS_VERSIONED_SCHEMAS)?;
        Ok(SqliteGrantStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_grant(row: &rusqlite::Row) -> rusqlite::Result<DownloadGrant> {
        Ok(DownloadGrant {
            id: row.get("id")?,
            line_item_id: row.get("line_item_id")?,
            owner_id: row.get("owner_id")?,
            product_id: row.get("product_id")?,
            access_token: row.get("access_token")?,
            quota: Quota::from_limit(row.get("download_limit")?),
            download_count: row.get("download_count")?,
            issued_at: row.get("issued_at")?,
            expires_at: row.get("expires_at")?,
            last_download_at: row.get("last_download_at")?,
        })
    }

    /// Current timestamp in seconds.
    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }
}

impl GrantStore for SqliteGrantStore {
    // === Grants ===

    fn insert_grant_if_absent(&self, grant: DownloadGrant) -> Result<DownloadGrant> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO download_grant (
                id, line_item_id, owner_id, product_id, access_token,
                download_limit, download_count, issued_at, expires_at, last_download_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(line_item_id) DO NOTHING",
            rusqlite::params![
                grant.id,
                grant.line_item_id,
                grant.owner_id,
                grant.product_id,
                grant.access_token,
                grant.quota.limit(),
                grant.download_count,
                grant.issued_at,
                grant.expires_at,
                grant.last_download_at,
            ],
        )?;

        let stored = conn.query_row(
            "SELECT * FROM download_grant WHERE line_item_id = ?1",
            rusqlite::params![grant.line_item_id],
            Self::row_to_grant,
        )?;
        Ok(stored)
    }

    fn get_grant_by_token(&self, access_token: &str) -> Result<Option<DownloadGrant>> {
        let conn = self.conn.lock().unwrap();
        let grant = conn
            .query_row(
                "SELECT * FROM download_grant WHERE access_token = ?1",
                rusqlite::params![access_token],
                Self::row_to_grant,
            )
            .optional()?;
        Ok(grant)
    }

    fn get_grant_by_line_item(&self, line_item_id: &str) -> Result<Option<DownloadGrant>> {
        let conn = self.conn.lock().unwrap();
        let grant = conn
            .query_row(
                "SELECT * FROM download_grant WHERE line_item_id = ?1",
                rusqlite::params![line_item_id],
                Self::row_to_grant,
            )
            .optional()?;
        Ok(grant)
    }

    fn get_grants_by_line_items(&self, line_item_ids: &[String]) -> Result<Vec<DownloadGrant>> {
        if line_item_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().unwrap();
        let placeholders = (1..=line_item_ids.len())
            .map(|position| format!("?{}", position))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT * FROM download_grant WHERE line_item_id IN ({}) ORDER BY issued_at, id",
            placeholders
        );
        let mut stmt = conn.prepare(&sql)?;
        let grants = stmt
            .query_map(
                rusqlite::params_from_iter(line_item_ids.iter()),
                Self::row_to_grant,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(grants)
    }

    fn replace_access_token(&self, grant_id: &str, new_token: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE download_grant SET access_token = ?1 WHERE id = ?2",
            rusqlite::params![new_token, grant_id],
        )?;
        if updated != 1 {
            bail!("No grant {} to rotate the token of", grant_id);
        }
        Ok(())
    }

    // === Consumption (atomic) ===

    fn consume_download(&self, access_token: &str, meta: &RequestMeta) -> Result<ConsumeOutcome> {
        let now = Self::now();
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // The WHERE clause is the entire gate: it re-checks expiry and
        // remaining quota at commit time, so a stale earlier read can
        // never overrun the limit.
        let updated = tx.execute(
            "UPDATE download_grant
             SET download_count = download_count + 1, last_download_at = ?1
             WHERE access_token = ?2
               AND (expires_at IS NULL OR expires_at > ?1)
               AND (download_limit IS NULL OR download_count < download_limit)",
            rusqlite::params![now, access_token],
        )?;

        if updated == 0 {
            // Nothing was written; classify the refusal from the row as it
            // stands inside this same transaction.
            let grant = tx
                .query_row(
                    "SELECT * FROM download_grant WHERE access_token = ?1",
                    rusqlite::params![access_token],
                    Self::row_to_grant,
                )
                .optional()?;
            return Ok(match grant {
                None => ConsumeOutcome::NotFound,
                Some(grant) if grant.is_expired(now) => ConsumeOutcome::Expired(grant),
                Some(grant) => ConsumeOutcome::LimitReached(grant),
            });
        }

        let grant = tx.query_row(
            "SELECT * FROM download_grant WHERE access_token = ?1",
            rusqlite::params![access_token],
            Self::row_to_grant,
        )?;

        tx.execute(
            "INSERT INTO download_audit_log (grant_id, request_ip, request_agent, occurred_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![grant.id, meta.ip, meta.user_agent, now],
        )?;

        tx.commit()?;
        Ok(ConsumeOutcome::Consumed(grant))
    }

    // === Audit log ===

    fn get_audit_tail(&self, grant_id: &str, limit: usize) -> Result<Vec<AuditLogEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM download_audit_log
             WHERE grant_id = ?1
             ORDER BY occurred_at DESC, id DESC
             LIMIT ?2",
        )?;
        let entries = stmt
            .query_map(rusqlite::params![grant_id, limit as i64], |row| {
                Ok(AuditLogEntry {
                    id: row.get("id")?,
                    grant_id: row.get("grant_id")?,
                    request_ip: row.get("request_ip")?,
                    request_agent: row.get("request_agent")?,
                    occurred_at: row.get("occurred_at")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}
