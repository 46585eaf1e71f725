//! Crawl-level errors and the warnings attached to partial results.
//!
//! Fatal problems abort a run and surface as [`CrawlError`]. Everything
//! recoverable degrades the result instead and is recorded as a [`Warning`]
//! on the [`Catalog`](crate::catalog::Catalog) or the
//! [`RenderableResult`](crate::command::RenderableResult), so the caller has a
//! single place to decide what the user sees.

use std::fmt;

use serde::Serialize;

use crate::config::{ConfigError, ConnectionError};
use crate::metadata::MetadataError;

/// Result type for crawl operations.
pub type CrawlResult<T> = Result<T, CrawlError>;

/// Errors that abort a crawl.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Invalid info level: {0}. Supported: minimum, standard, detailed, maximum")]
    InvalidInfoLevel(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Metadata retrieval failed: {0}")]
    Metadata(#[source] MetadataError),

    #[error("Catalog invariant violated: {0}")]
    CatalogInvariant(String),
}

/// Classification of a recoverable problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A metadata category could not be retrieved and is treated as empty.
    CategoryUnavailable,
    /// The crawl deadline expired before a category finished.
    Timeout,
    /// A cross-reference pointed at an entity that is not in the catalog.
    UnresolvedReference,
    /// A child entity arrived without its owner.
    OrphanedEntity,
    /// Foreign keys form a cycle, so dependency order was broken alphabetically.
    DependencyCycle,
    /// A non-empty include pattern matched none of the candidates.
    EmptyMatch,
    /// Schema-level and object-level rules are both restrictive.
    PatternOverlap,
    /// A query template referenced a variable that does not exist.
    TemplateSubstitution,
    /// A query failed to execute.
    QueryFailed,
}

/// A recoverable problem encountered during a run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}
