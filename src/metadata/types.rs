//! Intermediate metadata records.
//!
//! These are the uniform shape every driver reports in, one flat record per
//! row the introspection interface returns. Records carry no cross-links
//! other than identifiers; the catalog builder assembles them.

use std::collections::BTreeSet;

use serde::Serialize;

use super::provider::MetadataKind;
use crate::catalog::{SchemaRef, TableRef};
use crate::error::Warning;

/// Database product information.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DatabaseInfo {
    pub product_name: String,
    pub product_version: String,
    pub driver: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRecord {
    pub schema: SchemaRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRecord {
    pub table: TableRef,
    /// Vendor table type, e.g. `TABLE`, `BASE TABLE`, `VIEW`.
    pub kind: String,
    pub remarks: Option<String>,
    /// View definition, when the driver exposes it.
    pub definition: Option<String>,
}

impl TableRecord {
    pub fn new(table: TableRef, kind: &str) -> Self {
        Self {
            table,
            kind: kind.to_string(),
            remarks: None,
            definition: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRecord {
    pub table: TableRef,
    pub name: String,
    /// 1-based position; assigned from arrival order when missing.
    pub ordinal: Option<u32>,
    pub type_name: Option<String>,
    pub nullable: Option<bool>,
    pub default_value: Option<String>,
    pub remarks: Option<String>,
}

impl ColumnRecord {
    pub fn new(table: TableRef, name: &str, ordinal: u32, type_name: &str) -> Self {
        Self {
            table,
            name: name.to_string(),
            ordinal: Some(ordinal),
            type_name: Some(type_name.to_string()),
            nullable: Some(true),
            default_value: None,
            remarks: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = Some(false);
        self
    }
}

/// One column of one index. Multi-column indexes arrive as several rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    pub table: TableRef,
    pub name: Option<String>,
    pub column: String,
    /// 1-based position of `column` within the index.
    pub position: u32,
    pub unique: bool,
    pub primary: bool,
}

/// One column pair of one foreign key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRecord {
    pub name: Option<String>,
    /// The referencing table.
    pub foreign_table: TableRef,
    pub foreign_column: String,
    /// The referenced table.
    pub primary_table: TableRef,
    /// `None` means "the referenced table's primary key column at this
    /// position".
    pub primary_column: Option<String>,
    pub key_sequence: u32,
    pub update_rule: Option<String>,
    pub delete_rule: Option<String>,
}

impl ForeignKeyRecord {
    pub fn new(
        name: &str,
        foreign: (&TableRef, &str),
        primary: (&TableRef, &str),
        key_sequence: u32,
    ) -> Self {
        Self {
            name: Some(name.to_string()),
            foreign_table: foreign.0.clone(),
            foreign_column: foreign.1.to_string(),
            primary_table: primary.0.clone(),
            primary_column: Some(primary.1.to_string()),
            key_sequence,
            update_rule: None,
            delete_rule: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineRecord {
    pub schema: SchemaRef,
    pub name: String,
    /// Distinguishes overloads; defaults to `name`.
    pub specific_name: Option<String>,
    /// Vendor routine type, e.g. `PROCEDURE`, `FUNCTION`.
    pub kind: String,
    pub return_type: Option<String>,
    pub remarks: Option<String>,
    pub definition: Option<String>,
}

impl RoutineRecord {
    pub fn new(schema: SchemaRef, name: &str, kind: &str) -> Self {
        Self {
            schema,
            name: name.to_string(),
            specific_name: None,
            kind: kind.to_string(),
            return_type: None,
            remarks: None,
            definition: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterRecord {
    pub schema: SchemaRef,
    pub routine: String,
    pub specific_name: Option<String>,
    /// Drivers may omit names (positional parameters).
    pub name: Option<String>,
    pub ordinal: u32,
    /// Vendor mode, e.g. `IN`, `OUT`, `INOUT`, `RETURN`.
    pub mode: String,
    pub type_name: Option<String>,
}

impl ParameterRecord {
    pub fn new(
        schema: SchemaRef,
        routine: &str,
        name: Option<&str>,
        ordinal: u32,
        mode: &str,
        type_name: &str,
    ) -> Self {
        Self {
            schema,
            routine: routine.to_string(),
            specific_name: None,
            name: name.map(str::to_string),
            ordinal,
            mode: mode.to_string(),
            type_name: Some(type_name.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceRecord {
    pub schema: SchemaRef,
    pub name: String,
    pub start: Option<i64>,
    pub increment: Option<i64>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
    pub cycle: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymRecord {
    pub schema: SchemaRef,
    pub name: String,
    /// Qualified name of the aliased object.
    pub referenced_object: String,
}

/// The records of one category, as returned by a single provider call.
#[derive(Debug, Clone)]
pub enum Batch {
    Schemas(Vec<SchemaRecord>),
    Tables(Vec<TableRecord>),
    Columns(Vec<ColumnRecord>),
    Indexes(Vec<IndexRecord>),
    ForeignKeys(Vec<ForeignKeyRecord>),
    Routines(Vec<RoutineRecord>),
    Parameters(Vec<ParameterRecord>),
    Sequences(Vec<SequenceRecord>),
    Synonyms(Vec<SynonymRecord>),
}

impl Batch {
    pub fn kind(&self) -> MetadataKind {
        match self {
            Batch::Schemas(_) => MetadataKind::Schemas,
            Batch::Tables(_) => MetadataKind::Tables,
            Batch::Columns(_) => MetadataKind::Columns,
            Batch::Indexes(_) => MetadataKind::Indexes,
            Batch::ForeignKeys(_) => MetadataKind::ForeignKeys,
            Batch::Routines(_) => MetadataKind::Routines,
            Batch::Parameters(_) => MetadataKind::Parameters,
            Batch::Sequences(_) => MetadataKind::Sequences,
            Batch::Synonyms(_) => MetadataKind::Synonyms,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Batch::Schemas(v) => v.len(),
            Batch::Tables(v) => v.len(),
            Batch::Columns(v) => v.len(),
            Batch::Indexes(v) => v.len(),
            Batch::ForeignKeys(v) => v.len(),
            Batch::Routines(v) => v.len(),
            Batch::Parameters(v) => v.len(),
            Batch::Sequences(v) => v.len(),
            Batch::Synonyms(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything retrieved by one crawl, before filtering and assembly.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    pub database: DatabaseInfo,
    pub schemas: Vec<SchemaRecord>,
    pub tables: Vec<TableRecord>,
    pub columns: Vec<ColumnRecord>,
    pub indexes: Vec<IndexRecord>,
    pub foreign_keys: Vec<ForeignKeyRecord>,
    pub routines: Vec<RoutineRecord>,
    pub parameters: Vec<ParameterRecord>,
    pub sequences: Vec<SequenceRecord>,
    pub synonyms: Vec<SynonymRecord>,
    /// Categories that were requested but are missing from this set.
    pub omitted: BTreeSet<MetadataKind>,
    pub warnings: Vec<Warning>,
}

impl RecordSet {
    /// Add a complete batch.
    pub fn commit(&mut self, batch: Batch) {
        match batch {
            Batch::Schemas(v) => self.schemas.extend(v),
            Batch::Tables(v) => self.tables.extend(v),
            Batch::Columns(v) => self.columns.extend(v),
            Batch::Indexes(v) => self.indexes.extend(v),
            Batch::ForeignKeys(v) => self.foreign_keys.extend(v),
            Batch::Routines(v) => self.routines.extend(v),
            Batch::Parameters(v) => self.parameters.extend(v),
            Batch::Sequences(v) => self.sequences.extend(v),
            Batch::Synonyms(v) => self.synonyms.extend(v),
        }
    }

    /// Record that `kind` is missing, and why.
    pub fn omit(&mut self, kind: MetadataKind, warning: Warning) {
        self.omitted.insert(kind);
        self.warnings.push(warning);
    }
}
