//! An in-memory [`MetadataProvider`].
//!
//! Serves a fixed [`RecordSet`], with optional per-category failures and
//! delays. Useful for fixtures and for exercising vendor quirks (odd
//! ordering, duplicate rows, missing categories) without a live database.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use super::provider::{MetadataError, MetadataKind, MetadataProvider, MetadataResult};
use super::types::*;

#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    records: RecordSet,
    failures: HashMap<MetadataKind, MetadataError>,
    delays: HashMap<MetadataKind, Duration>,
    database_failure: Option<MetadataError>,
}

impl InMemoryProvider {
    pub fn new(records: RecordSet) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    /// Make every request for `kind` fail with `error`.
    pub fn failing(mut self, kind: MetadataKind, error: MetadataError) -> Self {
        self.failures.insert(kind, error);
        self
    }

    /// Make `database_info` fail, e.g. to simulate a dead connection.
    pub fn failing_database_info(mut self, error: MetadataError) -> Self {
        self.database_failure = Some(error);
        self
    }

    /// Delay every request for `kind`.
    pub fn delayed(mut self, kind: MetadataKind, delay: Duration) -> Self {
        self.delays.insert(kind, delay);
        self
    }

    async fn serve<T: Clone>(&self, kind: MetadataKind, rows: &[T]) -> MetadataResult<Vec<T>> {
        if let Some(delay) = self.delays.get(&kind) {
            tokio::time::sleep(*delay).await;
        }
        match self.failures.get(&kind) {
            Some(err) => Err(err.clone()),
            None => Ok(rows.to_vec()),
        }
    }
}

#[async_trait]
impl MetadataProvider for InMemoryProvider {
    async fn database_info(&self) -> MetadataResult<DatabaseInfo> {
        match &self.database_failure {
            Some(err) => Err(err.clone()),
            None => Ok(self.records.database.clone()),
        }
    }

    async fn list_schemas(&self) -> MetadataResult<Vec<SchemaRecord>> {
        self.serve(MetadataKind::Schemas, &self.records.schemas).await
    }

    async fn list_tables(&self) -> MetadataResult<Vec<TableRecord>> {
        self.serve(MetadataKind::Tables, &self.records.tables).await
    }

    async fn list_columns(&self) -> MetadataResult<Vec<ColumnRecord>> {
        self.serve(MetadataKind::Columns, &self.records.columns).await
    }

    async fn list_indexes(&self) -> MetadataResult<Vec<IndexRecord>> {
        self.serve(MetadataKind::Indexes, &self.records.indexes).await
    }

    async fn list_foreign_keys(&self) -> MetadataResult<Vec<ForeignKeyRecord>> {
        self.serve(MetadataKind::ForeignKeys, &self.records.foreign_keys)
            .await
    }

    async fn list_routines(&self) -> MetadataResult<Vec<RoutineRecord>> {
        self.serve(MetadataKind::Routines, &self.records.routines).await
    }

    async fn list_parameters(&self) -> MetadataResult<Vec<ParameterRecord>> {
        self.serve(MetadataKind::Parameters, &self.records.parameters)
            .await
    }

    async fn list_sequences(&self) -> MetadataResult<Vec<SequenceRecord>> {
        self.serve(MetadataKind::Sequences, &self.records.sequences).await
    }

    async fn list_synonyms(&self) -> MetadataResult<Vec<SynonymRecord>> {
        self.serve(MetadataKind::Synonyms, &self.records.synonyms).await
    }
}
