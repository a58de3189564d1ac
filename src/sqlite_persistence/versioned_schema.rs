use std::path::Path;

use anyhow::{bail, Context, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::info;

/// Offset added to the schema version before it is stored in
/// `PRAGMA user_version`, so a database created by unrelated software
/// (user_version 0) is never mistaken for schema version 0.
pub const SCHEMA_VERSION_OFFSET: i64 = 40_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
    Blob,
}

impl SqlType {
    fn sql_name(self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Blob => "BLOB",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForeignKeyAction {
    NoAction,
    Restrict,
    SetNull,
    SetDefault,
    Cascade,
}

impl ForeignKeyAction {
    fn sql_name(self) -> &'static str {
        match self {
            ForeignKeyAction::NoAction => "NO ACTION",
            ForeignKeyAction::Restrict => "RESTRICT",
            ForeignKeyAction::SetNull => "SET NULL",
            ForeignKeyAction::SetDefault => "SET DEFAULT",
            ForeignKeyAction::Cascade => "CASCADE",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
    pub on_delete: ForeignKeyAction,
}

/// Declarative column definition. Built with const chaining so table
/// definitions can live in `const` items next to the store that owns them.
#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub primary_key: bool,
    pub not_null: bool,
    pub unique: bool,
    pub default_value: Option<&'static str>,
    pub foreign_key: Option<ForeignKey>,
}

impl Column {
    pub const fn new(name: &'static str, sql_type: SqlType) -> Self {
        Column {
            name,
            sql_type,
            primary_key: false,
            not_null: false,
            unique: false,
            default_value: None,
            foreign_key: None,
        }
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn default_value(mut self, value: &'static str) -> Self {
        self.default_value = Some(value);
        self
    }

    pub const fn references(
        mut self,
        table: &'static str,
        column: &'static str,
        on_delete: ForeignKeyAction,
    ) -> Self {
        self.foreign_key = Some(ForeignKey {
            table,
            column,
            on_delete,
        });
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Index {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub unique: bool,
}

impl Index {
    pub const fn new(name: &'static str, columns: &'static [&'static str]) -> Self {
        Index {
            name,
            columns,
            unique: false,
        }
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    pub indices: &'static [Index],
}

impl Table {
    fn create_sql(&self) -> String {
        let mut sql = format!("CREATE TABLE {} (", self.name);
        for (position, column) in self.columns.iter().enumerate() {
            if position > 0 {
                sql.push_str(", ");
            }
            sql.push_str(column.name);
            sql.push(' ');
            sql.push_str(column.sql_type.sql_name());
            if column.primary_key {
                sql.push_str(" PRIMARY KEY");
            }
            if column.not_null {
                sql.push_str(" NOT NULL");
            }
            if column.unique {
                sql.push_str(" UNIQUE");
            }
            if let Some(default_value) = column.default_value {
                sql.push_str(&format!(" DEFAULT {}", default_value));
            }
            if let Some(foreign_key) = column.foreign_key {
                sql.push_str(&format!(
                    " REFERENCES {}({}) ON DELETE {}",
                    foreign_key.table,
                    foreign_key.column,
                    foreign_key.on_delete.sql_name()
                ));
            }
        }
        sql.push_str(");");
        sql
    }

    fn index_sql(&self, index: &Index) -> String {
        format!(
            "CREATE {}INDEX {} ON {}({});",
            if index.unique { "UNIQUE " } else { "" },
            index.name,
            self.name,
            index.columns.join(", ")
        )
    }

    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute(&self.create_sql(), [])?;
        for index in self.indices {
            conn.execute(&self.index_sql(index), [])?;
        }
        Ok(())
    }

    /// Checks that the table in the database structurally matches this
    /// definition: columns, indices and foreign keys.
    pub fn validate(&self, conn: &Connection) -> Result<()> {
        self.validate_columns(conn)?;
        self.validate_indices(conn)?;
        self.validate_foreign_keys(conn)?;
        Ok(())
    }

    fn validate_columns(&self, conn: &Connection) -> Result<()> {
        struct ActualColumn {
            name: String,
            type_name: String,
            not_null: bool,
            default_value: Option<String>,
            primary_key: bool,
        }

        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual_columns = stmt
            .query_map([], |row| {
                Ok(ActualColumn {
                    name: row.get(1)?,
                    type_name: row.get(2)?,
                    not_null: row.get::<_, i64>(3)? != 0,
                    default_value: row.get(4)?,
                    primary_key: row.get::<_, i64>(5)? != 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if actual_columns.len() != self.columns.len() {
            bail!(
                "Table {} has {} columns, expected {} ({})",
                self.name,
                actual_columns.len(),
                self.columns.len(),
                self.columns
                    .iter()
                    .map(|column| column.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        for (actual, expected) in actual_columns.iter().zip(self.columns.iter()) {
            if actual.name != expected.name {
                bail!(
                    "Table {}: expected column {}, found {}",
                    self.name,
                    expected.name,
                    actual.name
                );
            }
            if actual.type_name != expected.sql_type.sql_name() {
                bail!(
                    "Table {} column {}: expected type {}, found {}",
                    self.name,
                    expected.name,
                    expected.sql_type.sql_name(),
                    actual.type_name
                );
            }
            if actual.not_null != expected.not_null {
                bail!(
                    "Table {} column {}: NOT NULL mismatch (expected {}, found {})",
                    self.name,
                    expected.name,
                    expected.not_null,
                    actual.not_null
                );
            }
            if actual.primary_key != expected.primary_key {
                bail!(
                    "Table {} column {}: PRIMARY KEY mismatch (expected {}, found {})",
                    self.name,
                    expected.name,
                    expected.primary_key,
                    actual.primary_key
                );
            }
            // SQLite may echo default values back wrapped in parentheses.
            let actual_default = actual.default_value.as_deref().map(strip_outer_parentheses);
            let expected_default = expected.default_value.map(strip_outer_parentheses);
            if actual_default != expected_default {
                bail!(
                    "Table {} column {}: expected default {:?}, found {:?}",
                    self.name,
                    expected.name,
                    expected.default_value,
                    actual.default_value
                );
            }
        }
        Ok(())
    }

    fn validate_indices(&self, conn: &Connection) -> Result<()> {
        // PRAGMA index_list columns: seq, name, unique, origin, partial
        let mut stmt = conn.prepare(&format!("PRAGMA index_list({});", self.name))?;
        let actual_indices = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(1)?, row.get::<_, i64>(2)? != 0))
            })?
            .collect::<rusqlite::Result<Vec<(String, bool)>>>()?;

        for index in self.indices {
            let Some((_, actual_unique)) = actual_indices
                .iter()
                .find(|(name, _)| name == index.name)
            else {
                bail!("Table {} is missing index {}", self.name, index.name);
            };
            if *actual_unique != index.unique {
                bail!(
                    "Table {} index {}: UNIQUE mismatch (expected {}, found {})",
                    self.name,
                    index.name,
                    index.unique,
                    actual_unique
                );
            }

            let mut info_stmt = conn.prepare(&format!("PRAGMA index_info({});", index.name))?;
            let actual_columns = info_stmt
                .query_map([], |row| row.get::<_, String>(2))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            let columns_match = actual_columns.len() == index.columns.len()
                && actual_columns
                    .iter()
                    .zip(index.columns.iter())
                    .all(|(actual, expected)| actual.as_str() == *expected);
            if !columns_match {
                bail!(
                    "Table {} index {}: expected columns ({}), found ({})",
                    self.name,
                    index.name,
                    index.columns.join(", "),
                    actual_columns.join(", ")
                );
            }
        }
        Ok(())
    }

    fn validate_foreign_keys(&self, conn: &Connection) -> Result<()> {
        struct ActualForeignKey {
            from_column: String,
            to_table: String,
            to_column: String,
            on_delete: String,
        }

        // PRAGMA foreign_key_list columns:
        // id, seq, table, from, to, on_update, on_delete, match
        let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({});", self.name))?;
        let actual_fks = stmt
            .query_map([], |row| {
                Ok(ActualForeignKey {
                    from_column: row.get(3)?,
                    to_table: row.get(2)?,
                    to_column: row.get(4)?,
                    on_delete: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for column in self.columns {
            let Some(expected) = column.foreign_key else {
                continue;
            };
            match actual_fks.iter().find(|fk| fk.from_column == column.name) {
                None => bail!(
                    "Table {} column {} is missing foreign key to {}({})",
                    self.name,
                    column.name,
                    expected.table,
                    expected.column
                ),
                Some(actual) => {
                    if actual.to_table != expected.table
                        || actual.to_column != expected.column
                        || actual.on_delete != expected.on_delete.sql_name()
                    {
                        bail!(
                            "Table {} column {} foreign key mismatch: expected {}({}) ON DELETE {}, found {}({}) ON DELETE {}",
                            self.name,
                            column.name,
                            expected.table,
                            expected.column,
                            expected.on_delete.sql_name(),
                            actual.to_table,
                            actual.to_column,
                            actual.on_delete
                        );
                    }
                }
            }
        }
        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: i64,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table
                .create(conn)
                .with_context(|| format!("Failed to create table {}", table.name))?;
        }
        conn.execute(
            &format!(
                "PRAGMA user_version = {};",
                SCHEMA_VERSION_OFFSET + self.version
            ),
            [],
        )?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }
}

fn strip_outer_parentheses(value: &str) -> &str {
    value
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(value)
}

fn latest_schema(schemas: &'static [VersionedSchema]) -> Result<&'static VersionedSchema> {
    schemas.last().context("No schema versions defined")
}

/// Opens the database at `path`, creating it with the latest schema when the
/// file does not exist yet. An existing database is validated against the
/// schema at its stored version and then migrated to the latest one; a
/// database that is too old, too new, or structurally wrong is rejected.
pub fn open_database<P: AsRef<Path>>(
    path: P,
    schemas: &'static [VersionedSchema],
) -> Result<Connection> {
    let path = path.as_ref();
    let latest = latest_schema(schemas)?;

    if !path.exists() {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to create database at {:?}", path))?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;
        latest.create(&conn)?;
        info!("Created new database at {:?}", path);
        return Ok(conn);
    }

    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("Failed to open database at {:?}", path))?;
    conn.execute("PRAGMA foreign_keys = ON;", [])?;

    let stored_version = conn
        .query_row("PRAGMA user_version;", [], |row| row.get::<_, i64>(0))
        .context("Failed to read database version")?;
    let version = stored_version - SCHEMA_VERSION_OFFSET;

    if version < 0 {
        bail!(
            "Database at {:?} has user_version {}, not created by this software",
            path,
            stored_version
        );
    }
    if version > latest.version {
        bail!(
            "Database at {:?} has version {}, newer than the latest supported version {}",
            path,
            version,
            latest.version
        );
    }

    let current = schemas
        .iter()
        .find(|schema| schema.version == version)
        .with_context(|| format!("No schema defined for version {}", version))?;
    current
        .validate(&conn)
        .with_context(|| format!("Database at {:?} does not match schema version {}", path, version))?;

    migrate(&conn, schemas, version, latest.version)?;

    Ok(conn)
}

/// In-memory database with the latest schema, for tests.
pub fn open_in_memory(schemas: &'static [VersionedSchema]) -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute("PRAGMA foreign_keys = ON;", [])?;
    latest_schema(schemas)?.create(&conn)?;
    Ok(conn)
}

fn migrate(
    conn: &Connection,
    schemas: &'static [VersionedSchema],
    from: i64,
    to: i64,
) -> Result<()> {
    if from >= to {
        return Ok(());
    }
    info!("Migrating database from version {} to {}", from, to);
    for schema in schemas.iter().filter(|schema| schema.version > from) {
        if let Some(migration) = schema.migration {
            info!("Running migration to version {}", schema.version);
            migration(conn)
                .with_context(|| format!("Migration to version {} failed", schema.version))?;
        }
    }
    conn.execute(
        &format!("PRAGMA user_version = {};", SCHEMA_VERSION_OFFSET + to),
        [],
    )?;
    Ok(())
}
