//! Metadata retrieval module.
//!
//! This module defines the uniform record shape drivers report in, the
//! provider trait they implement, and the retriever that drives a provider
//! for one crawl.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Retriever                              │
//! │  - plans categories from InfoLevel + empty include patterns     │
//! │  - bounded concurrent fetches under one deadline                │
//! │  - per-category failure → warning, connection failure → error   │
//! │  - normalizes vendor quirks                                     │
//! └─────────────────────────────────────────────────────────────────┘
//!                           │ fetch(kind)
//!                           ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              MetadataProvider (SQLite, in-memory)               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use schemascope::config::CrawlOptions;
//! use schemascope::metadata::Retriever;
//!
//! let options = CrawlOptions::default();
//! let records = Retriever::new(connection.metadata(), &options)
//!     .retrieve()
//!     .await?;
//! ```

pub mod memory;
mod provider;
mod retriever;
mod types;

pub use memory::InMemoryProvider;
pub use provider::{MetadataError, MetadataKind, MetadataProvider, MetadataResult};
pub use retriever::{normalize, Retriever, UNKNOWN_TYPE};
pub use types::*;
