use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use super::schema::BUYERS_VERSIONED_SCHEMAS;
use crate::sqlite_persistence::open_database;

/// A signed-in buyer, as established by the marketplace.
#[derive(Debug, Clone)]
pub struct BuyerSession {
    pub buyer_id: String,
    pub token: String,
    /// When the marketplace created the session (Unix timestamp)
    pub created_at: i64,
    /// Last time the session was presented to this service
    pub last_used_at: Option<i64>,
}

pub trait SessionStore: Send + Sync {
    /// Resolves a session token to the buyer it belongs to.
    fn get_session(&self, token: &str) -> Result<Option<BuyerSession>>;

    /// Records that a session was just presented.
    fn update_session_last_used(&self, token: &str) -> Result<()>;

    /// Deletes sessions that have not been used for `max_idle_secs`.
    /// Returns the number of sessions removed.
    fn prune_idle_sessions(&self, max_idle_secs: i64) -> Result<usize>;
}

pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_database(db_path, BUYERS_VERSIONED_SCHEMAS)?;
        Ok(SqliteSessionStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = crate::sqlite_persistence::open_in_memory(BUYERS_VERSIONED_SCHEMAS)?;
        Ok(SqliteSessionStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<BuyerSession> {
        Ok(BuyerSession {
            buyer_id: row.get("buyer_id")?,
            token: row.get("token")?,
            created_at: row.get("created_at")?,
            last_used_at: row.get("last_used_at")?,
        })
    }

    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64
    }
}

impl SessionStore for SqliteSessionStore {
    fn get_session(&self, token: &str) -> Result<Option<BuyerSession>> {
        let conn = self.conn.lock().unwrap();
        let session = conn
            .query_row(
                "SELECT * FROM buyer_session WHERE token = ?1",
                rusqlite::params![token],
                Self::row_to_session,
            )
            .optional()?;
        Ok(session)
    }

    fn update_session_last_used(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE buyer_session SET last_used_at = ?1 WHERE token = ?2",
            rusqlite::params![Self::now(), token],
        )?;
        Ok(())
    }

    fn prune_idle_sessions(&self, max_idle_secs: i64) -> Result<usize> {
        let cutoff = Self::now() - max_idle_secs;
        let conn = self.conn.lock().unwrap();
        // A session never presented here counts as idle since its creation.
        let removed = conn.execute(
            "DELETE FROM buyer_session WHERE COALESCE(last_used_at, created_at) < ?1",
            rusqlite::params![cutoff],
        )?;
        Ok(removed)
    }
}
