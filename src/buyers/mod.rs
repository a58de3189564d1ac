//! Buyer identity, resolved from marketplace-issued session tokens.
//!
//! Sessions are created by the marketplace when a buyer signs in. This
//! service only resolves them, refreshes their last-used timestamp, and
//! prunes the ones gone idle.

mod schema;
mod session_store;

pub use schema::BUYERS_VERSIONED_SCHEMAS;
pub use session_store::{BuyerSession, SessionStore, SqliteSessionStore};
