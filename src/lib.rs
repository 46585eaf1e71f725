//! # Schemascope
//!
//! Crawls the structural metadata of a relational database into a
//! filterable, deterministic catalog, and runs reports or SQL queries over it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        Config (defaults < config file < CLI)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [connection]
//! ┌─────────────────────────────────────────────────────────┐
//! │     MetadataProvider  +  QueryExecutor (SQLite, ...)    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [metadata::Retriever]
//! ┌─────────────────────────────────────────────────────────┐
//! │          RecordSet (normalized, per category)           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [filter]  ──► [catalog::CatalogBuilder]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Catalog (sorted, references resolved)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [command] ──► [render]
//! ┌─────────────────────────────────────────────────────────┐
//! │              Report / query results                     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Recoverable problems never abort a run; they are collected as
//! [`Warning`]s on the catalog and on the command result.

pub mod catalog;
pub mod command;
pub mod config;
pub mod connection;
pub mod crawl;
pub mod error;
pub mod filter;
pub mod metadata;
pub mod render;
pub mod session;

pub use catalog::Catalog;
pub use command::{dispatch, Command, RenderableResult};
pub use config::{Config, ConnectionConfig, CrawlOptions, InfoLevel};
pub use crawl::{crawl, crawl_with};
pub use error::{CrawlError, CrawlResult, Warning, WarningKind};
pub use render::{render, OutputFormat};
pub use session::{run, RunError, RunFailure, RunOutcome, RunRequest, Stage};
