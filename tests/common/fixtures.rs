//! Test fixture creation for the catalog, downloads and buyers databases
//!
//! The catalog and buyer sessions are owned by the marketplace in production,
//! so tests seed them with direct SQL inserts after letting the stores
//! create their schemas.

use super::constants::*;
use anyhow::Result;
use bancarella_downloads_server::buyers::SqliteSessionStore;
use bancarella_downloads_server::catalog::SqliteCatalogStore;
use bancarella_downloads_server::downloads::SqliteGrantStore;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Epoch second stamped on all seeded rows
const SEED_TIMESTAMP: i64 = 1_700_000_000;

/// Creates a temporary data directory with all three databases seeded
///
/// The catalog gets one completed order by buyer 1 containing a digital
/// font pack and a physical tote bag. The buyers database gets one session
/// per test buyer. The downloads database starts empty; grants only appear
/// once the completion hook runs.
///
/// Returns (temp_dir, catalog_db_path, downloads_db_path, buyers_db_path).
pub fn create_test_data_dir() -> Result<(TempDir, PathBuf, PathBuf, PathBuf)> {
    let dir = TempDir::new()?;
    let catalog_db_path = dir.path().join("catalog.db");
    let downloads_db_path = dir.path().join("downloads.db");
    let buyers_db_path = dir.path().join("buyers.db");

    // Opening the stores once creates their schemas
    let _ = SqliteCatalogStore::new(&catalog_db_path)?;
    let _ = SqliteGrantStore::new(&downloads_db_path)?;
    let _ = SqliteSessionStore::new(&buyers_db_path)?;

    seed_catalog(&catalog_db_path)?;
    seed_sessions(&buyers_db_path)?;

    Ok((dir, catalog_db_path, downloads_db_path, buyers_db_path))
}

/// Inserts the test products, order and line items
fn seed_catalog(catalog_db_path: &Path) -> Result<()> {
    let conn = Connection::open(catalog_db_path)?;

    conn.execute(
        "INSERT INTO products (id, name, kind, resource_locator, download_limit, access_window_days)
         VALUES (?1, ?2, 'DIGITAL', ?3, ?4, ?5)",
        rusqlite::params![
            PRODUCT_FONT_PACK_ID,
            PRODUCT_FONT_PACK_NAME,
            PRODUCT_FONT_PACK_LOCATOR,
            PRODUCT_FONT_PACK_DOWNLOAD_LIMIT,
            PRODUCT_FONT_PACK_ACCESS_WINDOW_DAYS,
        ],
    )?;
    conn.execute(
        "INSERT INTO products (id, name, kind, resource_locator, download_limit, access_window_days)
         VALUES (?1, 'Tote Bag', 'PHYSICAL', NULL, NULL, NULL)",
        [PRODUCT_TOTE_BAG_ID],
    )?;

    conn.execute(
        "INSERT INTO orders (id, buyer_id, status, created_at) VALUES (?1, ?2, 'COMPLETED', ?3)",
        rusqlite::params![ORDER_1_ID, BUYER_1_ID, SEED_TIMESTAMP],
    )?;

    conn.execute(
        "INSERT INTO line_items (id, order_id, product_id) VALUES (?1, ?2, ?3)",
        [LINE_ITEM_FONT_PACK_ID, ORDER_1_ID, PRODUCT_FONT_PACK_ID],
    )?;
    conn.execute(
        "INSERT INTO line_items (id, order_id, product_id) VALUES (?1, ?2, ?3)",
        [LINE_ITEM_TOTE_BAG_ID, ORDER_1_ID, PRODUCT_TOTE_BAG_ID],
    )?;

    Ok(())
}

/// Inserts one marketplace session per test buyer
fn seed_sessions(buyers_db_path: &Path) -> Result<()> {
    let conn = Connection::open(buyers_db_path)?;

    conn.execute(
        "INSERT INTO buyer_session (buyer_id, token, created_at, last_used_at)
         VALUES (?1, ?2, ?3, NULL)",
        rusqlite::params![BUYER_1_ID, BUYER_1_SESSION_TOKEN, SEED_TIMESTAMP],
    )?;
    conn.execute(
        "INSERT INTO buyer_session (buyer_id, token, created_at, last_used_at)
         VALUES (?1, ?2, ?3, NULL)",
        rusqlite::params![BUYER_2_ID, BUYER_2_SESSION_TOKEN, SEED_TIMESTAMP],
    )?;

    Ok(())
}
