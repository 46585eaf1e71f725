//! MetadataProvider trait definition.
//!
//! The MetadataProvider trait abstracts over a database's metadata
//! introspection interface. Each method returns every row of one category
//! for the whole database; no ordering is promised between or within
//! categories.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;

use super::types::*;

/// Result type for metadata operations.
pub type MetadataResult<T> = Result<T, MetadataError>;

/// Errors from a metadata call.
///
/// Only [`MetadataError::Connection`] is fatal; everything else costs the
/// crawl one category.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MetadataError {
    #[error("{0} not supported by this driver")]
    Unsupported(MetadataKind),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("metadata query failed: {0}")]
    QueryFailed(String),

    #[error("connection failed: {0}")]
    Connection(String),
}

impl MetadataError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// A category of metadata fetched by one provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataKind {
    Schemas,
    Tables,
    Columns,
    Indexes,
    ForeignKeys,
    Routines,
    Parameters,
    Sequences,
    Synonyms,
}

impl MetadataKind {
    pub const ALL: [MetadataKind; 9] = [
        MetadataKind::Schemas,
        MetadataKind::Tables,
        MetadataKind::Columns,
        MetadataKind::Indexes,
        MetadataKind::ForeignKeys,
        MetadataKind::Routines,
        MetadataKind::Parameters,
        MetadataKind::Sequences,
        MetadataKind::Synonyms,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataKind::Schemas => "schemas",
            MetadataKind::Tables => "tables",
            MetadataKind::Columns => "columns",
            MetadataKind::Indexes => "indexes",
            MetadataKind::ForeignKeys => "foreign keys",
            MetadataKind::Routines => "routines",
            MetadataKind::Parameters => "routine parameters",
            MetadataKind::Sequences => "sequences",
            MetadataKind::Synonyms => "synonyms",
        }
    }
}

impl fmt::Display for MetadataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for fetching raw database metadata.
///
/// Drivers implement the per-category calls; [`fetch`](Self::fetch) maps a
/// [`MetadataKind`] onto them. Categories a driver has no notion of keep the
/// default implementation, which reports them as unsupported.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Get database product information. A connection failure here aborts
    /// the crawl.
    async fn database_info(&self) -> MetadataResult<DatabaseInfo>;

    async fn list_schemas(&self) -> MetadataResult<Vec<SchemaRecord>>;

    async fn list_tables(&self) -> MetadataResult<Vec<TableRecord>>;

    async fn list_columns(&self) -> MetadataResult<Vec<ColumnRecord>>;

    async fn list_indexes(&self) -> MetadataResult<Vec<IndexRecord>>;

    async fn list_foreign_keys(&self) -> MetadataResult<Vec<ForeignKeyRecord>>;

    async fn list_routines(&self) -> MetadataResult<Vec<RoutineRecord>> {
        Err(MetadataError::Unsupported(MetadataKind::Routines))
    }

    async fn list_parameters(&self) -> MetadataResult<Vec<ParameterRecord>> {
        Err(MetadataError::Unsupported(MetadataKind::Parameters))
    }

    async fn list_sequences(&self) -> MetadataResult<Vec<SequenceRecord>> {
        Err(MetadataError::Unsupported(MetadataKind::Sequences))
    }

    async fn list_synonyms(&self) -> MetadataResult<Vec<SynonymRecord>> {
        Err(MetadataError::Unsupported(MetadataKind::Synonyms))
    }

    /// Fetch one whole category.
    async fn fetch(&self, kind: MetadataKind) -> MetadataResult<Batch> {
        Ok(match kind {
            MetadataKind::Schemas => Batch::Schemas(self.list_schemas().await?),
            MetadataKind::Tables => Batch::Tables(self.list_tables().await?),
            MetadataKind::Columns => Batch::Columns(self.list_columns().await?),
            MetadataKind::Indexes => Batch::Indexes(self.list_indexes().await?),
            MetadataKind::ForeignKeys => Batch::ForeignKeys(self.list_foreign_keys().await?),
            MetadataKind::Routines => Batch::Routines(self.list_routines().await?),
            MetadataKind::Parameters => Batch::Parameters(self.list_parameters().await?),
            MetadataKind::Sequences => Batch::Sequences(self.list_sequences().await?),
            MetadataKind::Synonyms => Batch::Synonyms(self.list_synonyms().await?),
        })
    }
}
