mod versioned_schema;

pub use versioned_schema::{
    open_database, open_in_memory, Column, ForeignKey, ForeignKeyAction, Index, SqlType, Table,
    VersionedSchema, SCHEMA_VERSION_OFFSET,
};
