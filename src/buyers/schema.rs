//! Database schema for buyers.db.

use crate::sqlite_persistence::{Column, Index, SqlType, Table, VersionedSchema};

/// V 0
const BUYER_SESSION_TABLE_V0: Table = Table {
    name: "buyer_session",
    columns: &[
        Column::new("buyer_id", SqlType::Text).not_null(),
        Column::new("token", SqlType::Text).not_null().unique(),
        Column::new("created_at", SqlType::Integer).not_null(),
        Column::new("last_used_at", SqlType::Integer),
    ],
    indices: &[Index::new("idx_buyer_session_last_used", &["last_used_at"])],
};

pub const BUYERS_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[BUYER_SESSION_TABLE_V0],
    migration: None,
}];
