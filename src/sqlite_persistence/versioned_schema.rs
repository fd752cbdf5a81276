use anyhow::{bail, Context, Result};
use rusqlite::{params, types::Type, Connection};
use std::path::Path;
use tracing::info;

pub const DEFAULT_TIMESTAMP: &str = "(cast(strftime('%s','now') as int))";

pub const BASE_DB_VERSION: usize = 99999;

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            // Only mutated when optional field assignments are passed in
            #[allow(unused_mut)]
            let mut column = Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                is_unique: false,
                default_value: None,
                foreign_key: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, PartialEq, Eq)]
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

    fn from_sql(s: &str) -> Option<&'static SqlType> {
        match s {
            "TEXT" => Some(&SqlType::Text),
            "INTEGER" => Some(&SqlType::Integer),
            "REAL" => Some(&SqlType::Real),
            "BLOB" => Some(&SqlType::Blob),
            _ => None,
        }
    }
}

#[allow(unused)]
pub enum ForeignKeyOnChange {
    NoAction,
    Restrict,
    SetNull,
    SetDefault,
    Cascade,
}

impl ForeignKeyOnChange {
    fn as_sql(&self) -> &'static str {
        match self {
            ForeignKeyOnChange::NoAction => "NO ACTION",
            ForeignKeyOnChange::Restrict => "RESTRICT",
            ForeignKeyOnChange::SetNull => "SET NULL",
            ForeignKeyOnChange::SetDefault => "SET DEFAULT",
            ForeignKeyOnChange::Cascade => "CASCADE",
        }
    }
}

pub struct ForeignKey {
    pub foreign_table: &'static str,
    pub foreign_column: &'static str,
    pub on_delete: ForeignKeyOnChange,
}

pub struct Column<'a, S: AsRef<str>> {
    pub name: S,
    pub sql_type: &'a SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub is_unique: bool,
    pub default_value: Option<S>,
    pub foreign_key: Option<&'a ForeignKey>,
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column<'static, &'static str>],
    pub indices: &'static [(&'static str, &'static str)],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| {
                // Quoted so keyword column names such as `check` stay valid
                let mut sql = format!("\"{}\" {}", column.name, column.sql_type.as_sql());
                if column.is_primary_key {
                    sql.push_str(" PRIMARY KEY");
                }
                if column.non_null {
                    sql.push_str(" NOT NULL");
                }
                if column.is_unique {
                    sql.push_str(" UNIQUE");
                }
                if let Some(default_value) = column.default_value {
                    sql.push_str(&format!(" DEFAULT {}", default_value));
                }
                if let Some(fk) = column.foreign_key {
                    sql.push_str(&format!(
                        " REFERENCES {}({}) ON DELETE {}",
                        fk.foreign_table,
                        fk.foreign_column,
                        fk.on_delete.as_sql()
                    ));
                }
                sql
            })
            .chain(
                self.unique_constraints
                    .iter()
                    .map(|cols| {
                        let quoted: Vec<String> =
                            cols.iter().map(|c| format!("\"{}\"", c)).collect();
                        format!("UNIQUE ({})", quoted.join(", "))
                    }),
            )
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({});", self.name, columns)
    }

    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute(&self.create_sql(), params![])?;
        for (index_name, columns) in self.indices {
            conn.execute(
                &format!("CREATE INDEX {} ON {}({});", index_name, self.name, columns),
                params![],
            )?;
        }
        Ok(())
    }

    fn validate_columns(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual: Vec<Column<'_, String>> = stmt
            .query_map(params![], |row| {
                let type_name: String = row.get(2)?;
                let sql_type = SqlType::from_sql(&type_name).ok_or_else(|| {
                    rusqlite::Error::InvalidColumnType(2, type_name.clone(), Type::Text)
                })?;
                Ok(Column {
                    name: row.get(1)?,
                    sql_type,
                    non_null: row.get::<_, i32>(3)? == 1,
                    default_value: row.get::<_, Option<String>>(4)?,
                    is_primary_key: row.get::<_, i32>(5)? == 1,
                    is_unique: false,
                    foreign_key: None,
                })
            })?
            .collect::<rusqlite::Result<_>>()
            .with_context(|| format!("Failed to read columns of table {}", self.name))?;

        if actual.len() != self.columns.len() {
            bail!(
                "Table {} has {} columns, expected {}. Found: {}, expected: {}",
                self.name,
                actual.len(),
                self.columns.len(),
                actual
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                self.columns
                    .iter()
                    .map(|c| c.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        for (found, expected) in actual.iter().zip(self.columns.iter()) {
            if found.name != expected.name {
                bail!(
                    "Table {} column name mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    found.name
                );
            }
            if found.sql_type != expected.sql_type {
                bail!(
                    "Table {} column {} type mismatch: expected {:?}, got {:?}",
                    self.name,
                    expected.name,
                    expected.sql_type,
                    found.sql_type
                );
            }
            if found.non_null != expected.non_null {
                bail!(
                    "Table {} column {} non-null mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    expected.non_null,
                    found.non_null
                );
            }
            // sqlite may report defaults wrapped in parentheses
            let found_default = found.default_value.as_deref().map(strip_parentheses);
            let expected_default = expected.default_value.map(strip_parentheses);
            if found_default != expected_default {
                bail!(
                    "Table {} column {} default value mismatch: expected {:?}, got {:?}",
                    self.name,
                    expected.name,
                    expected.default_value,
                    found.default_value
                );
            }
            if found.is_primary_key != expected.is_primary_key {
                bail!(
                    "Table {} column {} primary key mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    expected.is_primary_key,
                    found.is_primary_key
                );
            }
        }
        Ok(())
    }

    fn validate_indices(&self, conn: &Connection) -> Result<()> {
        for (index_name, _) in self.indices {
            let exists = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2",
                    params![index_name, self.name],
                    |_| Ok(true),
                )
                .unwrap_or(false);
            if !exists {
                bail!("Table {} is missing index '{}'", self.name, index_name);
            }
        }
        Ok(())
    }

    fn validate_unique_constraints(&self, conn: &Connection) -> Result<()> {
        if self.unique_constraints.is_empty() {
            return Ok(());
        }

        let mut stmt = conn.prepare(&format!("PRAGMA index_list({})", self.name))?;
        let unique_indices: Vec<String> = stmt
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i32>(2)?)))?
            .filter_map(|r| r.ok())
            .filter(|(_, unique)| *unique == 1)
            .map(|(name, _)| name)
            .collect();

        let mut unique_column_sets = Vec::with_capacity(unique_indices.len());
        for index_name in &unique_indices {
            let mut idx_stmt = conn.prepare(&format!("PRAGMA index_info({})", index_name))?;
            let mut cols: Vec<String> = idx_stmt
                .query_map([], |row| row.get::<_, String>(2))?
                .filter_map(|r| r.ok())
                .collect();
            cols.sort();
            unique_column_sets.push(cols);
        }

        for expected in self.unique_constraints {
            let mut wanted: Vec<&str> = expected.to_vec();
            wanted.sort();
            let found = unique_column_sets
                .iter()
                .any(|cols| cols.iter().map(String::as_str).eq(wanted.iter().copied()));
            if !found {
                bail!(
                    "Table {} is missing unique constraint on columns ({})",
                    self.name,
                    expected.join(", ")
                );
            }
        }
        Ok(())
    }

    fn validate_foreign_keys(&self, conn: &Connection) -> Result<()> {
        struct ActualFk {
            from: String,
            table: String,
            to: String,
            on_delete: String,
        }

        // id, seq, table, from, to, on_update, on_delete, match
        let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({})", self.name))?;
        let actual: Vec<ActualFk> = stmt
            .query_map([], |row| {
                Ok(ActualFk {
                    table: row.get(2)?,
                    from: row.get(3)?,
                    to: row.get(4)?,
                    on_delete: row.get(6)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        for column in self.columns {
            let Some(expected) = column.foreign_key else {
                continue;
            };
            let on_delete = expected.on_delete.as_sql();
            let matches = actual.iter().any(|fk| {
                fk.from == column.name
                    && fk.table == expected.foreign_table
                    && fk.to == expected.foreign_column
                    && fk.on_delete == on_delete
            });
            if matches {
                continue;
            }
            match actual.iter().find(|fk| fk.from == column.name) {
                Some(fk) => bail!(
                    "Table {} column {} has foreign key mismatch: expected REFERENCES {}({}) ON DELETE {}, got REFERENCES {}({}) ON DELETE {}",
                    self.name,
                    column.name,
                    expected.foreign_table,
                    expected.foreign_column,
                    on_delete,
                    fk.table,
                    fk.to,
                    fk.on_delete
                ),
                None => bail!(
                    "Table {} column {} is missing foreign key: expected REFERENCES {}({}) ON DELETE {}",
                    self.name,
                    column.name,
                    expected.foreign_table,
                    expected.foreign_column,
                    on_delete
                ),
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

fn strip_parentheses(s: &str) -> &str {
    s.strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(s)
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
            table.validate_columns(conn)?;
            table.validate_indices(conn)?;
            table.validate_unique_constraints(conn)?;
            table.validate_foreign_keys(conn)?;
        }
        Ok(())
    }
}

/// Opens the database at `db_path`, creating it from the latest schema when
/// missing. Existing databases are validated against the schema matching
/// their stored version and then migrated forward.
///
/// `seed` runs once, right after a brand new database is created.
pub fn open_versioned(
    db_path: &Path,
    schemas: &'static [VersionedSchema],
    label: &str,
    seed: fn(&Connection) -> Result<()>,
) -> Result<Connection> {
    let latest = schemas.last().context("No schemas defined")?;

    let conn = if db_path.exists() {
        Connection::open_with_flags(
            db_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open {} database at {:?}", label, db_path))?
    } else {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to create {} database at {:?}", label, db_path))?;
        latest.create(&conn)?;
        seed(&conn)?;
        info!("Created new {} database at {:?}", label, db_path);
        conn
    };

    conn.execute("PRAGMA foreign_keys = ON;", [])?;

    let db_version = conn
        .query_row("PRAGMA user_version;", [], |row| row.get::<usize, i64>(0))
        .context("Failed to read database version")?
        - BASE_DB_VERSION as i64;
    if db_version < 0 {
        bail!(
            "{} database version {} is too old, does not contain base db version {}",
            label,
            db_version,
            BASE_DB_VERSION
        );
    }
    let version = db_version as usize;
    if version >= schemas.len() {
        bail!(
            "{} database version {} is too new (max supported: {})",
            label,
            version,
            schemas.len() - 1
        );
    }

    schemas[version].validate(&conn)?;
    migrate_if_needed(&conn, schemas, version, label)?;
    Ok(conn)
}

fn migrate_if_needed(
    conn: &Connection,
    schemas: &[VersionedSchema],
    current_version: usize,
    label: &str,
) -> Result<()> {
    let target_version = schemas.len() - 1;
    if current_version >= target_version {
        return Ok(());
    }

    info!(
        "Migrating {} database from version {} to {}",
        label, current_version, target_version
    );
    for schema in schemas.iter().skip(current_version + 1) {
        if let Some(migration) = schema.migration {
            info!("Running {} migration to version {}", label, schema.version);
            migration(conn)?;
        }
    }
    conn.execute(
        &format!("PRAGMA user_version = {}", BASE_DB_VERSION + target_version),
        [],
    )?;
    Ok(())
}
