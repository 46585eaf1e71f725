//! SQLite driver.
//!
//! Metadata comes from SQLite's catalog pragmas:
//!
//! | category     | source                                   |
//! |--------------|------------------------------------------|
//! | schemas      | `PRAGMA database_list`                   |
//! | tables/views | `<schema>.sqlite_master`                 |
//! | columns      | `PRAGMA <schema>.table_info(<table>)`    |
//! | indexes      | `PRAGMA index_list` + `PRAGMA index_info` |
//! | foreign keys | `PRAGMA foreign_key_list`                |
//!
//! SQLite resolves key targets case-insensitively, so a key may spell its
//! tables and columns differently from their declarations. Those names are
//! reported as declared.
//!
//! SQLite has no routines, sequences or synonyms; those categories keep the
//! provider's "unsupported" defaults. A rusqlite connection cannot be used
//! from two threads at once, so every call takes the same mutex inside
//! `spawn_blocking`.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::OpenFlags;
use tracing::debug;

use super::{CellValue, Connection, QueryExecutor, QueryResult};
use crate::catalog::{quote_identifier, SchemaRef, TableRef};
use crate::config::{ConnectionError, ConnectionResult};
use crate::metadata::*;

const MEMORY_TARGET: &str = ":memory:";

/// Failure of one blocking call.
#[derive(Debug, thiserror::Error)]
enum CallError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("connection mutex poisoned")]
    Poisoned,

    #[error("blocking task failed: {0}")]
    Join(String),
}

impl From<CallError> for MetadataError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Sqlite(e) => MetadataError::QueryFailed(e.to_string()),
            other => MetadataError::Connection(other.to_string()),
        }
    }
}

impl From<CallError> for ConnectionError {
    fn from(err: CallError) -> Self {
        match err {
            CallError::Sqlite(e) => ConnectionError::QueryFailed(e.to_string()),
            other => ConnectionError::Broken(other.to_string()),
        }
    }
}

/// An open SQLite database.
pub struct SqliteConnection {
    conn: Arc<Mutex<rusqlite::Connection>>,
    target: String,
}

impl SqliteConnection {
    /// Open a database file (which must already exist), or `:memory:`.
    pub fn open(target: &str) -> ConnectionResult<Self> {
        let opened = if target == MEMORY_TARGET {
            rusqlite::Connection::open_in_memory()
        } else {
            rusqlite::Connection::open_with_flags(
                target,
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
        };
        let conn = opened.map_err(|e| ConnectionError::OpenFailed {
            url: target.to_string(),
            message: e.to_string(),
        })?;
        debug!(target, "sqlite connection opened");
        Ok(Self::wrap(conn, target))
    }

    /// Wrap an already open connection (for testing).
    pub fn from_connection(conn: rusqlite::Connection) -> Self {
        Self::wrap(conn, MEMORY_TARGET)
    }

    fn wrap(conn: rusqlite::Connection, target: &str) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            target: target.to_string(),
        }
    }

    async fn call<T, F>(&self, f: F) -> Result<T, CallError>
    where
        F: FnOnce(&rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> Result<T, CallError> {
            let guard = conn.lock().map_err(|_| CallError::Poisoned)?;
            Ok(f(&guard)?)
        })
        .await
        .map_err(|e| CallError::Join(e.to_string()))?
    }

    /// Blocking calls still holding the connection. A call whose caller gave
    /// up (a crawl deadline) runs on until SQLite returns.
    pub(crate) fn in_flight_calls(&self) -> usize {
        Arc::strong_count(&self.conn) - 1
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        let in_flight = self.in_flight_calls();
        if in_flight == 0 {
            debug!(target = %self.target, "sqlite connection closed");
        } else {
            debug!(
                target = %self.target,
                in_flight,
                "sqlite connection released; closes after in-flight calls finish"
            );
        }
    }
}

impl Connection for SqliteConnection {
    fn metadata(&self) -> &dyn MetadataProvider {
        self
    }

    fn executor(&self) -> &dyn QueryExecutor {
        self
    }
}

// =============================================================================
// Catalog queries
// =============================================================================

/// Attached databases. `temp` is skipped while it holds nothing.
fn schema_names(conn: &rusqlite::Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("PRAGMA database_list")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut kept = Vec::with_capacity(names.len());
    for name in names {
        if name == "temp" {
            let objects: i64 =
                conn.query_row("SELECT COUNT(*) FROM temp.sqlite_master", [], |row| row.get(0))?;
            if objects == 0 {
                continue;
            }
        }
        kept.push(name);
    }
    Ok(kept)
}

/// `(schema, table, type, sql)` for every user table and view.
fn table_rows(
    conn: &rusqlite::Connection,
) -> rusqlite::Result<Vec<(String, String, String, Option<String>)>> {
    let mut rows = Vec::new();
    for schema in schema_names(conn)? {
        let sql = format!(
            "SELECT name, type, sql FROM {}.sqlite_master \
             WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite_%'",
            quote_identifier(&schema)
        );
        let mut stmt = conn.prepare(&sql)?;
        let found = stmt
            .query_map([], |row| {
                Ok((
                    schema.clone(),
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.extend(found);
    }
    Ok(rows)
}

fn table_ref(schema: &str, table: &str) -> TableRef {
    SchemaRef::named(schema).table(table)
}

fn pragma(schema: &str, name: &str, arg: &str) -> String {
    format!(
        "PRAGMA {}.{}({})",
        quote_identifier(schema),
        name,
        quote_identifier(arg)
    )
}

struct TableInfo {
    cid: u32,
    name: String,
    type_name: String,
    not_null: bool,
    default_value: Option<String>,
    pk: u32,
}

fn table_info(
    conn: &rusqlite::Connection,
    schema: &str,
    table: &str,
) -> rusqlite::Result<Vec<TableInfo>> {
    let mut stmt = conn.prepare(&pragma(schema, "table_info", table))?;
    let rows: rusqlite::Result<Vec<TableInfo>> = stmt
        .query_map([], |row| {
            Ok(TableInfo {
                cid: row.get(0)?,
                name: row.get(1)?,
                type_name: row.get(2)?,
                not_null: row.get::<_, i64>(3)? != 0,
                default_value: row.get(4)?,
                pk: row.get(5)?,
            })
        })?
        .collect();
    rows
}

fn columns(conn: &rusqlite::Connection) -> rusqlite::Result<Vec<ColumnRecord>> {
    let mut records = Vec::new();
    for (schema, table, _, _) in table_rows(conn)? {
        let owner = table_ref(&schema, &table);
        for info in table_info(conn, &schema, &table)? {
            records.push(ColumnRecord {
                table: owner.clone(),
                name: info.name,
                ordinal: Some(info.cid + 1),
                type_name: Some(info.type_name),
                nullable: Some(!info.not_null && info.pk == 0),
                default_value: info.default_value,
                remarks: None,
            });
        }
    }
    Ok(records)
}

fn indexes(conn: &rusqlite::Connection) -> rusqlite::Result<Vec<IndexRecord>> {
    let mut records = Vec::new();
    for (schema, table, kind, _) in table_rows(conn)? {
        if kind != "table" {
            continue;
        }
        let owner = table_ref(&schema, &table);

        // The primary key, including rowid aliases that have no index.
        for info in table_info(conn, &schema, &table)? {
            if info.pk > 0 {
                records.push(IndexRecord {
                    table: owner.clone(),
                    name: None,
                    column: info.name,
                    position: info.pk,
                    unique: true,
                    primary: true,
                });
            }
        }

        let mut stmt = conn.prepare(&pragma(&schema, "index_list", &table))?;
        let listed = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)? != 0,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for (index, unique, origin) in listed {
            if origin == "pk" {
                continue;
            }
            let mut stmt = conn.prepare(&pragma(&schema, "index_info", &index))?;
            let columns = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, u32>(0)?, row.get::<_, Option<String>>(2)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            // Expression columns have no name.
            for (seqno, column) in columns {
                if let Some(column) = column {
                    records.push(IndexRecord {
                        table: owner.clone(),
                        name: Some(index.clone()),
                        column,
                        position: seqno + 1,
                        unique,
                        primary: false,
                    });
                }
            }
        }
    }
    Ok(records)
}

/// One row of `PRAGMA foreign_key_list`, names as written in the key.
struct KeyRow {
    id: i64,
    seq: u32,
    target: String,
    from: String,
    to: Option<String>,
    on_update: Option<String>,
    on_delete: Option<String>,
}

/// Declared column names, per `(schema, table)`.
type ColumnNames = HashMap<(String, String), Vec<String>>;

/// The declared spelling of `written` among `table`'s columns. Unknown
/// names are returned unchanged.
fn declared_column(
    conn: &rusqlite::Connection,
    cache: &mut ColumnNames,
    schema: &str,
    table: &str,
    written: String,
) -> rusqlite::Result<String> {
    let names = match cache.entry((schema.to_string(), table.to_string())) {
        Entry::Occupied(entry) => entry.into_mut(),
        Entry::Vacant(entry) => entry.insert(
            table_info(conn, schema, table)?
                .into_iter()
                .map(|info| info.name)
                .collect(),
        ),
    };
    Ok(names
        .iter()
        .find(|name| name.eq_ignore_ascii_case(&written))
        .cloned()
        .unwrap_or(written))
}

fn foreign_keys(conn: &rusqlite::Connection) -> rusqlite::Result<Vec<ForeignKeyRecord>> {
    let tables = table_rows(conn)?;
    let mut columns = ColumnNames::new();
    let mut records = Vec::new();

    for (schema, table, kind, _) in &tables {
        if kind != "table" {
            continue;
        }
        let owner = table_ref(schema, table);
        let mut stmt = conn.prepare(&pragma(schema, "foreign_key_list", table))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(KeyRow {
                    id: row.get(0)?,
                    seq: row.get(1)?,
                    target: row.get(2)?,
                    from: row.get(3)?,
                    to: row.get(4)?,
                    on_update: row.get(5)?,
                    on_delete: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for row in rows {
            // Keys only reach tables of their own database.
            let target = tables
                .iter()
                .find(|(s, t, _, _)| s == schema && t.eq_ignore_ascii_case(&row.target))
                .map(|(_, t, _, _)| t.clone())
                .unwrap_or(row.target);
            let foreign_column = declared_column(conn, &mut columns, schema, table, row.from)?;
            let primary_column = match row.to {
                Some(to) => Some(declared_column(conn, &mut columns, schema, &target, to)?),
                None => None,
            };
            records.push(ForeignKeyRecord {
                // SQLite keys are anonymous; `id` tells them apart.
                name: Some(format!("FK_{}_{}", table, row.id)),
                foreign_table: owner.clone(),
                foreign_column,
                primary_table: table_ref(schema, &target),
                primary_column,
                key_sequence: row.seq + 1,
                update_rule: row.on_update,
                delete_rule: row.on_delete,
            });
        }
    }
    Ok(records)
}

fn run_query(conn: &rusqlite::Connection, sql: &str) -> rusqlite::Result<QueryResult> {
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let width = columns.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query([])?;
    while let Some(row) = cursor.next()? {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(match row.get_ref(i)? {
                ValueRef::Null => CellValue::Null,
                ValueRef::Integer(v) => CellValue::Integer(v),
                ValueRef::Real(v) => CellValue::Real(v),
                ValueRef::Text(v) => CellValue::Text(String::from_utf8_lossy(v).into_owned()),
                ValueRef::Blob(v) => CellValue::Blob(v.to_vec()),
            });
        }
        rows.push(cells);
    }
    Ok(QueryResult { columns, rows })
}

// =============================================================================
// Trait implementations
// =============================================================================

#[async_trait]
impl MetadataProvider for SqliteConnection {
    async fn database_info(&self) -> MetadataResult<DatabaseInfo> {
        let version = self
            .call(|conn| conn.query_row("SELECT sqlite_version()", [], |row| row.get(0)))
            .await
            // Failing here means the connection itself is unusable.
            .map_err(|e| MetadataError::Connection(e.to_string()))?;

        Ok(DatabaseInfo {
            product_name: "SQLite".to_string(),
            product_version: version,
            driver: "rusqlite".to_string(),
        })
    }

    async fn list_schemas(&self) -> MetadataResult<Vec<SchemaRecord>> {
        let names = self.call(schema_names).await?;
        Ok(names
            .iter()
            .map(|name| SchemaRecord {
                schema: SchemaRef::named(name),
            })
            .collect())
    }

    async fn list_tables(&self) -> MetadataResult<Vec<TableRecord>> {
        let rows = self.call(table_rows).await?;
        Ok(rows
            .into_iter()
            .map(|(schema, table, kind, sql)| TableRecord {
                table: table_ref(&schema, &table),
                definition: if kind == "view" { sql } else { None },
                kind,
                remarks: None,
            })
            .collect())
    }

    async fn list_columns(&self) -> MetadataResult<Vec<ColumnRecord>> {
        Ok(self.call(columns).await?)
    }

    async fn list_indexes(&self) -> MetadataResult<Vec<IndexRecord>> {
        Ok(self.call(indexes).await?)
    }

    async fn list_foreign_keys(&self) -> MetadataResult<Vec<ForeignKeyRecord>> {
        Ok(self.call(foreign_keys).await?)
    }
}

#[async_trait]
impl QueryExecutor for SqliteConnection {
    async fn execute(&self, sql: &str) -> Result<QueryResult, ConnectionError> {
        let sql = sql.to_string();
        debug!(%sql, "executing query");
        Ok(self.call(move |conn| run_query(conn, &sql)).await?)
    }
}
