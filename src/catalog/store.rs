use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};

use super::models::{LineItem, Order, OrderStatus, Product, ProductKind};
use super::schema::CATALOG_VERSIONED_SCHEMAS;
use crate::sqlite_persistence::open_database;

/// Read access to the commerce data entitlement decisions depend on.
pub trait CatalogStore: Send + Sync {
    // === Orders ===

    /// Looks up an order by id.
    fn get_order(&self, order_id: &str) -> Result<Option<Order>>;

    /// All line items belonging to an order.
    fn get_order_line_items(&self, order_id: &str) -> Result<Vec<LineItem>>;

    // === Line items ===

    /// Looks up a single line item by id.
    fn get_line_item(&self, line_item_id: &str) -> Result<Option<LineItem>>;

    // === Products ===

    /// Looks up a product by id.
    fn get_product(&self, product_id: &str) -> Result<Option<Product>>;
}

pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogStore {
    /// Opens the catalog database, creating an empty one if the file does
    /// not exist yet.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = open_database(db_path, CATALOG_VERSIONED_SCHEMAS)?;
        Ok(SqliteCatalogStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = crate::sqlite_persistence::open_in_memory(CATALOG_VERSIONED_SCHEMAS)?;
        Ok(SqliteCatalogStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_order(row: &rusqlite::Row) -> rusqlite::Result<Order> {
        Ok(Order {
            id: row.get("id")?,
            buyer_id: row.get("buyer_id")?,
            // An unknown status reads as PENDING, which never grants access.
            status: OrderStatus::from_str(&row.get::<_, String>("status")?)
                .unwrap_or(OrderStatus::Pending),
            created_at: row.get("created_at")?,
        })
    }

    fn row_to_line_item(row: &rusqlite::Row) -> rusqlite::Result<LineItem> {
        Ok(LineItem {
            id: row.get("id")?,
            order_id: row.get("order_id")?,
            product_id: row.get("product_id")?,
        })
    }

    fn row_to_product(row: &rusqlite::Row) -> rusqlite::Result<Product> {
        Ok(Product {
            id: row.get("id")?,
            name: row.get("name")?,
            kind: ProductKind::from_str(&row.get::<_, String>("kind")?)
                .unwrap_or(ProductKind::Physical),
            resource_locator: row.get("resource_locator")?,
            download_limit: row.get("download_limit")?,
            access_window_days: row.get("access_window_days")?,
        })
    }
}

impl CatalogStore for SqliteCatalogStore {
    // === Orders ===

    fn get_order(&self, order_id: &str) -> Result<Option<Order>> {
        let conn = self.conn.lock().unwrap();
        let order = conn
            .query_row(
                "SELECT * FROM orders WHERE id = ?1",
                rusqlite::params![order_id],
                Self::row_to_order,
            )
            .optional()?;
        Ok(order)
    }

    fn get_order_line_items(&self, order_id: &str) -> Result<Vec<LineItem>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM line_items WHERE order_id = ?1 ORDER BY id")?;
        let items = stmt
            .query_map(rusqlite::params![order_id], Self::row_to_line_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    // === Line items ===

    fn get_line_item(&self, line_item_id: &str) -> Result<Option<LineItem>> {
        let conn = self.conn.lock().unwrap();
        let item = conn
            .query_row(
                "SELECT * FROM line_items WHERE id = ?1",
                rusqlite::params![line_item_id],
                Self::row_to_line_item,
            )
            .optional()?;
        Ok(item)
    }

    // === Products ===

    fn get_product(&self, product_id: &str) -> Result<Option<Product>> {
        let conn = self.conn.lock().unwrap();
        let product = conn
            .query_row(
                "SELECT * FROM products WHERE id = ?1",
                rusqlite::params![product_id],
                Self::row_to_product,
            )
            .optional()?;
        Ok(product)
    }
}
