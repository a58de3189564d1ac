//! Database schema for catalog.db.
//!
//! The marketplace owns this data. The definitions here let tests and fresh
//! deployments bootstrap an empty catalog with the expected structure, and
//! make sure an existing database is validated on open.

use crate::sqlite_persistence::{Column, ForeignKeyAction, Index, SqlType, Table, VersionedSchema};

/// V 0
const PRODUCTS_TABLE_V0: Table = Table {
    name: "products",
    columns: &[
        Column::new("id", SqlType::Text).primary_key(),
        Column::new("name", SqlType::Text).not_null(),
        Column::new("kind", SqlType::Text).not_null(),
        Column::new("resource_locator", SqlType::Text),
        Column::new("download_limit", SqlType::Integer),
        Column::new("access_window_days", SqlType::Integer),
    ],
    indices: &[],
};

/// V 0
const ORDERS_TABLE_V0: Table = Table {
    name: "orders",
    columns: &[
        Column::new("id", SqlType::Text).primary_key(),
        Column::new("buyer_id", SqlType::Text).not_null(),
        Column::new("status", SqlType::Text).not_null(),
        Column::new("created_at", SqlType::Integer).not_null(),
    ],
    indices: &[Index::new("idx_orders_buyer", &["buyer_id"])],
};

/// V 0
const LINE_ITEMS_TABLE_V0: Table = Table {
    name: "line_items",
    columns: &[
        Column::new("id", SqlType::Text).primary_key(),
        Column::new("order_id", SqlType::Text)
            .not_null()
            .references("orders", "id", ForeignKeyAction::Cascade),
        Column::new("product_id", SqlType::Text)
            .not_null()
            .references("products", "id", ForeignKeyAction::Restrict),
    ],
    indices: &[Index::new("idx_line_items_order", &["order_id"])],
};

pub const CATALOG_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[PRODUCTS_TABLE_V0, ORDERS_TABLE_V0, LINE_ITEMS_TABLE_V0],
    migration: None,
}];
