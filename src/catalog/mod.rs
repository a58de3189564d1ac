//! Read-only view of the marketplace commerce data this service depends on.
//!
//! Orders, line items and products are owned and written by the marketplace;
//! entitlement decisions only read them. Lookups go straight to the database
//! so order status checks always observe live state.

mod models;
mod schema;
mod store;

pub use models::{LineItem, Order, OrderStatus, Product, ProductKind};
pub use schema::CATALOG_VERSIONED_SCHEMAS;
pub use store::{CatalogStore, SqliteCatalogStore};
