//! Concurrent, failure-tolerant metadata retrieval.
//!
//! The retriever decides which categories a crawl needs, fetches them through
//! a [`MetadataProvider`] with a bounded number of requests in flight, and
//! normalizes what comes back into uniform records.
//!
//! ```text
//!   planned kinds ──► buffer_unordered(max_workers) ──► commit per batch
//!                          │                                 │
//!                    deadline expires                  RecordSet
//!                          ▼
//!                 unfinished kinds omitted
//! ```
//!
//! A batch is committed only once its request completes, so a cancelled or
//! failed category never leaves partial rows behind.

use std::collections::{BTreeSet, HashMap};

use futures::stream::{self, StreamExt};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

use super::provider::{MetadataError, MetadataKind, MetadataProvider};
use super::types::*;
use crate::catalog::{clean_name, TableRef};
use crate::config::{CrawlOptions, InfoLevel};
use crate::error::{CrawlError, CrawlResult, Warning, WarningKind};

/// Type name substituted when a driver reports none.
pub const UNKNOWN_TYPE: &str = "UNKNOWN";

/// Drives a [`MetadataProvider`] for one crawl.
pub struct Retriever<'a> {
    provider: &'a dyn MetadataProvider,
    options: &'a CrawlOptions,
}

impl<'a> Retriever<'a> {
    pub fn new(provider: &'a dyn MetadataProvider, options: &'a CrawlOptions) -> Self {
        Self { provider, options }
    }

    /// Categories this crawl fetches.
    ///
    /// A category is skipped when the info level excludes it, or when the
    /// include pattern of any category governing it is empty.
    pub fn planned_kinds(&self) -> Vec<MetadataKind> {
        MetadataKind::ALL
            .into_iter()
            .filter(|kind| self.options.plans(*kind))
            .collect()
    }

    /// Fetch and normalize every planned category.
    ///
    /// Only a connection failure is returned as an error. Any other failed
    /// category, and any category still running at the deadline, is recorded
    /// as omitted with a warning.
    pub async fn retrieve(&self) -> CrawlResult<RecordSet> {
        let mut records = RecordSet::default();

        records.database = match self.provider.database_info().await {
            Ok(info) => info,
            Err(err) if err.is_fatal() => return Err(CrawlError::Metadata(err)),
            Err(err) => {
                warn!(error = %err, "database info unavailable");
                records.warnings.push(Warning::new(
                    WarningKind::CategoryUnavailable,
                    format!("database info: {err}"),
                ));
                DatabaseInfo::default()
            }
        };

        let kinds = self.planned_kinds();
        info!(
            info_level = %self.options.info_level,
            categories = kinds.len(),
            "retrieving metadata"
        );

        let mut pending: BTreeSet<MetadataKind> = kinds.iter().copied().collect();
        let deadline = Instant::now() + self.options.timeout;
        let provider = self.provider;
        let mut fetches = stream::iter(kinds)
            .map(|kind| async move { (kind, provider.fetch(kind).await) })
            .buffer_unordered(self.options.max_workers.max(1));

        loop {
            match timeout_at(deadline, fetches.next()).await {
                Ok(Some((kind, Ok(batch)))) => {
                    pending.remove(&kind);
                    debug!(category = %kind, rows = batch.len(), "retrieved");
                    records.commit(normalize(batch, self.options.info_level));
                }
                Ok(Some((kind, Err(err)))) => {
                    pending.remove(&kind);
                    if err.is_fatal() {
                        return Err(CrawlError::Metadata(err));
                    }
                    log_unavailable(kind, &err);
                    records.omit(
                        kind,
                        Warning::new(WarningKind::CategoryUnavailable, format!("{kind}: {err}")),
                    );
                }
                Ok(None) => break,
                Err(_) => {
                    // Dropping `fetches` below cancels whatever is in flight.
                    for kind in std::mem::take(&mut pending) {
                        warn!(category = %kind, "crawl deadline expired");
                        records.omit(
                            kind,
                            Warning::new(
                                WarningKind::Timeout,
                                format!(
                                    "{kind}: not retrieved within {}s",
                                    self.options.timeout.as_secs()
                                ),
                            ),
                        );
                    }
                    break;
                }
            }
        }

        Ok(records)
    }
}

fn log_unavailable(kind: MetadataKind, err: &MetadataError) {
    match err {
        MetadataError::Unsupported(_) => debug!(category = %kind, "not supported by driver"),
        other => warn!(category = %kind, error = %other, "category unavailable"),
    }
}

/// Rule categories whose empty include pattern makes `kind` pointless.
/// Bring one batch into the uniform record shape.
pub fn normalize(batch: Batch, level: InfoLevel) -> Batch {
    let remarks = |r: Option<String>| {
        if level.retrieves_remarks() {
            clean_name(r.as_deref())
        } else {
            None
        }
    };
    let definition = |d: Option<String>| {
        if level.retrieves_definitions() {
            d.filter(|d| !d.trim().is_empty())
        } else {
            None
        }
    };

    match batch {
        Batch::Tables(tables) => Batch::Tables(
            tables
                .into_iter()
                .map(|t| TableRecord {
                    kind: t.kind.trim().to_uppercase(),
                    remarks: remarks(t.remarks),
                    definition: definition(t.definition),
                    ..t
                })
                .collect(),
        ),
        Batch::Columns(columns) => {
            let mut arrival: HashMap<TableRef, u32> = HashMap::new();
            Batch::Columns(
                columns
                    .into_iter()
                    .map(|c| {
                        let position = arrival.entry(c.table.clone()).or_insert(0);
                        *position += 1;
                        ColumnRecord {
                            name: c.name.trim().to_string(),
                            ordinal: c.ordinal.or(Some(*position)),
                            type_name: clean_name(c.type_name.as_deref())
                                .or_else(|| Some(UNKNOWN_TYPE.to_string())),
                            // Unknown nullability is reported as nullable.
                            nullable: c.nullable.or(Some(true)),
                            remarks: remarks(c.remarks),
                            ..c
                        }
                    })
                    .collect(),
            )
        }
        Batch::Indexes(indexes) => Batch::Indexes(
            indexes
                .into_iter()
                .map(|i| IndexRecord {
                    name: clean_name(i.name.as_deref()),
                    column: i.column.trim().to_string(),
                    ..i
                })
                .collect(),
        ),
        Batch::ForeignKeys(keys) => Batch::ForeignKeys(
            keys.into_iter()
                .map(|k| ForeignKeyRecord {
                    name: clean_name(k.name.as_deref()),
                    foreign_column: k.foreign_column.trim().to_string(),
                    primary_column: clean_name(k.primary_column.as_deref()),
                    update_rule: clean_name(k.update_rule.as_deref()).map(|r| r.to_uppercase()),
                    delete_rule: clean_name(k.delete_rule.as_deref()).map(|r| r.to_uppercase()),
                    ..k
                })
                .collect(),
        ),
        Batch::Routines(routines) => Batch::Routines(
            routines
                .into_iter()
                .map(|r| RoutineRecord {
                    specific_name: clean_name(r.specific_name.as_deref())
                        .or_else(|| Some(r.name.clone())),
                    kind: r.kind.trim().to_uppercase(),
                    return_type: clean_name(r.return_type.as_deref()),
                    remarks: remarks(r.remarks),
                    definition: definition(r.definition),
                    ..r
                })
                .collect(),
        ),
        Batch::Parameters(parameters) => Batch::Parameters(
            parameters
                .into_iter()
                .map(|p| ParameterRecord {
                    specific_name: clean_name(p.specific_name.as_deref())
                        .or_else(|| Some(p.routine.clone())),
                    // Positional parameters are named by their ordinal.
                    name: clean_name(p.name.as_deref()).or_else(|| Some(p.ordinal.to_string())),
                    mode: p.mode.trim().to_uppercase(),
                    type_name: clean_name(p.type_name.as_deref())
                        .or_else(|| Some(UNKNOWN_TYPE.to_string())),
                    ..p
                })
                .collect(),
        ),
        other => other,
    }
}
