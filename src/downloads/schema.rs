//! Database schema for downloads.db.
//!
//! Two tables: the grants themselves and the append-only audit log of
//! successful consumptions. The audit log is only ever written inside the
//! same transaction that advances a grant's download counter.

use crate::sqlite_persistence::{Column, ForeignKeyAction, Index, SqlType, Table, VersionedSchema};

/// V 0
const DOWNLOAD_GRANT_TABLE_V0: Table = Table {
    name: "download_grant",
    columns: &[
        Column::new("id", SqlType::Text).primary_key(),
        Column::new("line_item_id", SqlType::Text).not_null().unique(),
        Column::new("owner_id", SqlType::Text).not_null(),
        Column::new("product_id", SqlType::Text).not_null(),
        Column::new("access_token", SqlType::Text).not_null().unique(),
        Column::new("download_limit", SqlType::Integer),
        Column::new("download_count", SqlType::Integer)
            .not_null()
            .default_value("0"),
        Column::new("issued_at", SqlType::Integer).not_null(),
        Column::new("expires_at", SqlType::Integer),
        Column::new("last_download_at", SqlType::Integer),
    ],
    indices: &[Index::new("idx_download_grant_owner", &["owner_id"])],
};

/// V 0
const DOWNLOAD_AUDIT_LOG_TABLE_V0: Table = Table {
    name: "download_audit_log",
    columns: &[
        Column::new("id", SqlType::Integer).primary_key(),
        Column::new("grant_id", SqlType::Text)
            .not_null()
            .references("download_grant", "id", ForeignKeyAction::Cascade),
        Column::new("request_ip", SqlType::Text),
        Column::new("request_agent", SqlType::Text),
        Column::new("occurred_at", SqlType::Integer).not_null(),
    ],
    indices: &[Index::new(
        "idx_download_audit_grant",
        &["grant_id", "occurred_at"],
    )],
};

pub const DOWNLOADS_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[DOWNLOAD_GRANT_TABLE_V0, DOWNLOAD_AUDIT_LOG_TABLE_V0],
    migration: None,
}];
