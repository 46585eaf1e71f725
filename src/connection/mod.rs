//! Connectivity: opening a database and talking to it.
//!
//! A [`Connection`] is the capability a run holds for its whole duration. It
//! exposes two faces: the [`MetadataProvider`] the crawler introspects
//! through, and a [`QueryExecutor`] for ad-hoc queries. Dropping the
//! connection closes it, so every exit path releases it.

mod sqlite;

pub use sqlite::SqliteConnection;

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::config::{ConnectionConfig, ConnectionError, ConnectionResult, Driver};
use crate::metadata::MetadataProvider;

/// An open database connection.
pub trait Connection: Send + Sync {
    fn metadata(&self) -> &dyn MetadataProvider;

    fn executor(&self) -> &dyn QueryExecutor;
}

/// Runs SQL against a live connection.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<QueryResult, ConnectionError>;
}

/// A single result cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => f.write_str("NULL"),
            CellValue::Integer(v) => write!(f, "{v}"),
            CellValue::Real(v) => write!(f, "{v}"),
            CellValue::Text(v) => f.write_str(v),
            CellValue::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// Column names and rows returned by one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Open a connection for `config`.
///
/// Environment variables in the URL and credentials are expanded first.
pub fn open(config: &ConnectionConfig) -> ConnectionResult<Box<dyn Connection>> {
    let config = config.resolved()?;
    let (driver, target) = config.driver()?;
    debug!(driver = driver.as_str(), url = config.display_url(), "opening connection");

    match driver {
        Driver::Sqlite => {
            if config.user.is_some() {
                debug!("sqlite ignores credentials");
            }
            Ok(Box::new(SqliteConnection::open(&target)?))
        }
    }
}
