//! Bancarella Downloads Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod buyers;
pub mod catalog;
pub mod config;
pub mod downloads;
pub mod server;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use buyers::{SessionStore, SqliteSessionStore};
pub use catalog::{CatalogStore, SqliteCatalogStore};
pub use downloads::{DownloadManager, DownloadManagerConfig, GrantStore, SqliteGrantStore};
pub use server::{run_server, RequestsLoggingLevel};
