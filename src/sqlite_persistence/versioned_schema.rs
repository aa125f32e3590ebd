//! Declarative SQLite schemas with versioning.
//!
//! Tables are declared as consts, created on first open, and validated
//! against the live database on every subsequent open. The schema version is
//! tracked in `PRAGMA user_version`, offset by [`BASE_DB_VERSION`] so that a
//! foreign database file is never mistaken for one of ours.

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::info;

pub const BASE_DB_VERSION: usize = 41000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
    Blob,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
            SqlType::Blob => "BLOB",
        }
    }

    fn from_sql(s: &str) -> Option<Self> {
        match s {
            "TEXT" => Some(SqlType::Text),
            "INTEGER" => Some(SqlType::Integer),
            "REAL" => Some(SqlType::Real),
            "BLOB" => Some(SqlType::Blob),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum OnDelete {
    NoAction,
    Restrict,
    SetNull,
    Cascade,
}

impl OnDelete {
    fn as_sql(&self) -> &'static str {
        match self {
            OnDelete::NoAction => "NO ACTION",
            OnDelete::Restrict => "RESTRICT",
            OnDelete::SetNull => "SET NULL",
            OnDelete::Cascade => "CASCADE",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
    pub on_delete: OnDelete,
}

#[derive(Debug, Clone, Copy)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub primary_key: bool,
    pub non_null: bool,
    pub unique: bool,
    pub default_value: Option<&'static str>,
    pub references: Option<ForeignKey>,
}

impl Column {
    pub const fn new(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            sql_type,
            primary_key: false,
            non_null: false,
            unique: false,
            default_value: None,
            references: None,
        }
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn non_null(mut self) -> Self {
        self.non_null = true;
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
        on_delete: OnDelete,
    ) -> Self {
        self.references = Some(ForeignKey {
            table,
            column,
            on_delete,
        });
        self
    }
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    /// (index name, comma-separated column list)
    pub indices: &'static [(&'static str, &'static str)],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        let mut sql = format!("CREATE TABLE {} (", self.name);
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(column.name);
            sql.push(' ');
            sql.push_str(column.sql_type.as_sql());
            if column.primary_key {
                sql.push_str(" PRIMARY KEY");
            }
            if column.non_null {
                sql.push_str(" NOT NULL");
            }
            if column.unique {
                sql.push_str(" UNIQUE");
            }
            if let Some(default_value) = column.default_value {
                sql.push_str(&format!(" DEFAULT {}", default_value));
            }
            if let Some(fk) = column.references {
                sql.push_str(&format!(
                    " REFERENCES {}({}) ON DELETE {}",
                    fk.table,
                    fk.column,
                    fk.on_delete.as_sql()
                ));
            }
        }
        for unique_constraint in self.unique_constraints {
            sql.push_str(&format!(", UNIQUE ({})", unique_constraint.join(", ")));
        }
        sql.push_str(");");
        conn.execute(&sql, params![])?;

        for (index_name, column_list) in self.indices {
            conn.execute(
                &format!(
                    "CREATE INDEX {} ON {}({});",
                    index_name, self.name, column_list
                ),
                params![],
            )?;
        }
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual: Vec<(String, String, bool, bool)> = stmt
            .query_map(params![], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)? == 1,
                    row.get::<_, i32>(5)? == 1,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if actual.len() != self.columns.len() {
            bail!(
                "Table {} has {} columns, expected {}. Found: {}, expected: {}",
                self.name,
                actual.len(),
                self.columns.len(),
                actual
                    .iter()
                    .map(|(name, _, _, _)| name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                self.columns
                    .iter()
                    .map(|c| c.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        for ((name, sql_type, non_null, primary_key), expected) in
            actual.iter().zip(self.columns.iter())
        {
            if name != expected.name {
                bail!(
                    "Table {} column name mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    name
                );
            }
            match SqlType::from_sql(sql_type) {
                Some(t) if t == expected.sql_type => {}
                _ => bail!(
                    "Table {} column {} type mismatch: expected {:?}, got {}",
                    self.name,
                    expected.name,
                    expected.sql_type,
                    sql_type
                ),
            }
            if *non_null != expected.non_null {
                bail!(
                    "Table {} column {} non-null mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    expected.non_null,
                    non_null
                );
            }
            if *primary_key != expected.primary_key {
                bail!(
                    "Table {} column {} primary-key mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    expected.primary_key,
                    primary_key
                );
            }
        }
        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute("PRAGMA foreign_keys = ON;", params![])?;
        for table in self.tables {
            table.create(conn)?;
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + self.version),
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

/// Open a database file, creating it with the latest schema when it does not
/// exist, or validating (and migrating, if needed) an existing one.
pub fn open_versioned<P: AsRef<Path>>(
    db_path: P,
    schemas: &[VersionedSchema],
) -> Result<Connection> {
    let conn = if db_path.as_ref().exists() {
        Connection::open_with_flags(
            &db_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?
    } else {
        let conn = Connection::open(&db_path)?;
        schemas
            .last()
            .context("No schemas defined")?
            .create(&conn)?;
        info!("Created new database at {:?}", db_path.as_ref());
        conn
    };

    conn.execute("PRAGMA foreign_keys = ON;", [])?;

    let db_version = conn
        .query_row("PRAGMA user_version;", [], |row| row.get::<usize, i64>(0))
        .context("Failed to read database version")?
        - BASE_DB_VERSION as i64;
    if db_version < 0 {
        bail!(
            "Database {:?} does not carry base version {}",
            db_path.as_ref(),
            BASE_DB_VERSION
        );
    }
    let version = db_version as usize;
    if version >= schemas.len() {
        bail!(
            "Database version {} is too new (max supported: {})",
            version,
            schemas.len() - 1
        );
    }

    schemas
        .get(version)
        .context("Failed to get schema")?
        .validate(&conn)?;

    migrate_if_needed(&conn, schemas, version)?;

    Ok(conn)
}

/// Create an in-memory database with the latest schema, for tests.
pub fn create_in_memory(schemas: &[VersionedSchema]) -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute("PRAGMA foreign_keys = ON;", [])?;
    schemas
        .last()
        .context("No schemas defined")?
        .create(&conn)?;
    Ok(conn)
}

fn migrate_if_needed(
    conn: &Connection,
    schemas: &[VersionedSchema],
    current_version: usize,
) -> Result<()> {
    let target_version = schemas.len() - 1;
    if current_version >= target_version {
        return Ok(());
    }

    info!(
        "Migrating database from version {} to {}",
        current_version, target_version
    );
    for schema in schemas.iter().skip(current_version + 1) {
        if let Some(migration_fn) = schema.migration {
            info!("Running migration to version {}", schema.version);
            migration_fn(conn)?;
        }
    }
    conn.execute(
        &format!("PRAGMA user_version = {}", BASE_DB_VERSION + target_version),
        [],
    )?;
    Ok(())
}
