//! The catalog: an immutable model of one crawl's database metadata.
//!
//! ```text
//! Catalog
//!  └── Schema (catalog + schema)
//!       ├── Table ── Column, Index, ForeignKey
//!       ├── Routine ── Parameter
//!       ├── Sequence
//!       └── Synonym
//! ```
//!
//! Ownership is strictly top-down. Cross-links (a column's table, a foreign
//! key's endpoints, a synonym's target) are identifier values, so the model
//! has no cycles and can be serialized as-is.

mod builder;
mod naming;
mod order;
mod validation;

pub use builder::CatalogBuilder;
pub use naming::{
    clean_name, is_plain_identifier, qualify, quote_identifier, sql_identifier, NameStyle,
    SchemaRef, TableRef,
};
pub use order::dependency_order;

use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::Warning;
use crate::metadata::{DatabaseInfo, MetadataKind};

/// The root aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Catalog {
    pub database: DatabaseInfo,
    pub schemas: Vec<Schema>,
    /// How names are rendered; fixed for the whole catalog.
    pub naming: NameStyle,
    /// Categories that could not be retrieved.
    pub omitted: BTreeSet<MetadataKind>,
    /// Every table's column list is complete. Index and foreign key columns
    /// then always name a column of their table.
    #[serde(skip)]
    pub columns_retrieved: bool,
    pub warnings: Vec<Warning>,
}

impl Catalog {
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.schemas.iter().flat_map(|s| s.tables.iter())
    }

    pub fn routines(&self) -> impl Iterator<Item = &Routine> {
        self.schemas.iter().flat_map(|s| s.routines.iter())
    }

    pub fn sequences(&self) -> impl Iterator<Item = &Sequence> {
        self.schemas.iter().flat_map(|s| s.sequences.iter())
    }

    pub fn synonyms(&self) -> impl Iterator<Item = &Synonym> {
        self.schemas.iter().flat_map(|s| s.synonyms.iter())
    }

    pub fn schema(&self, id: &SchemaRef) -> Option<&Schema> {
        self.schemas.iter().find(|s| &s.id == id)
    }

    pub fn table(&self, id: &TableRef) -> Option<&Table> {
        self.schema(&id.schema)?
            .tables
            .iter()
            .find(|t| t.id.name == id.name)
    }

    /// A table's name as this catalog renders it.
    pub fn table_name(&self, id: &TableRef) -> String {
        self.naming.table_name(id)
    }

    /// Any schema-owned object's name as this catalog renders it.
    pub fn object_name(&self, schema: &SchemaRef, name: &str) -> String {
        self.naming.object_name(schema, name)
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.iter().all(Schema::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    pub id: SchemaRef,
    pub tables: Vec<Table>,
    pub routines: Vec<Routine>,
    pub sequences: Vec<Sequence>,
    pub synonyms: Vec<Synonym>,
}

impl Schema {
    pub fn new(id: SchemaRef) -> Self {
        Self {
            id,
            tables: Vec::new(),
            routines: Vec::new(),
            sequences: Vec::new(),
            synonyms: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
            && self.routines.is_empty()
            && self.sequences.is_empty()
            && self.synonyms.is_empty()
    }
}

// ============================================================================
// Tables
// ============================================================================

/// Table type discriminant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Table,
    View,
    System,
    Temporary,
    Other(String),
}

impl TableKind {
    /// Map a vendor table type.
    pub fn from_vendor(kind: &str) -> Self {
        match kind.trim().to_uppercase().as_str() {
            "TABLE" | "BASE TABLE" => TableKind::Table,
            "VIEW" => TableKind::View,
            "SYSTEM TABLE" | "SYSTEM VIEW" => TableKind::System,
            "GLOBAL TEMPORARY" | "LOCAL TEMPORARY" | "TEMPORARY TABLE" => TableKind::Temporary,
            other => TableKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TableKind::Table => "table",
            TableKind::View => "view",
            TableKind::System => "system table",
            TableKind::Temporary => "temporary table",
            TableKind::Other(kind) => kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub id: TableRef,
    pub kind: TableKind,
    pub columns: Vec<Column>,
    pub primary_key: Option<Index>,
    pub indexes: Vec<Index>,
    /// Keys this table participates in, imported and exported, by name.
    pub foreign_keys: Vec<ForeignKey>,
    pub remarks: Option<String>,
    pub definition: Option<String>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Keys whose referencing side is this table.
    pub fn imported_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.foreign_keys
            .iter()
            .filter(move |fk| fk.foreign_table == self.id)
    }

    /// Keys whose referenced side is this table.
    pub fn exported_keys(&self) -> impl Iterator<Item = &ForeignKey> {
        self.foreign_keys
            .iter()
            .filter(move |fk| fk.primary_table == self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    /// Owning table.
    pub table: TableRef,
    pub name: String,
    pub ordinal: u32,
    pub type_name: String,
    pub nullable: bool,
    pub default_value: Option<String>,
    pub remarks: Option<String>,
    pub part_of_primary_key: bool,
    pub part_of_foreign_key: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Primary,
    Unique,
    NonUnique,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Index {
    pub name: String,
    pub kind: IndexKind,
    /// Column names in index order.
    pub columns: Vec<String>,
}

// ============================================================================
// Foreign keys
// ============================================================================

/// Referential action on update or delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeyRule {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl ForeignKeyRule {
    pub fn from_vendor(rule: Option<&str>) -> Self {
        match rule.map(|r| r.trim().to_uppercase()).as_deref() {
            Some("RESTRICT") => ForeignKeyRule::Restrict,
            Some("CASCADE") => ForeignKeyRule::Cascade,
            Some("SET NULL") => ForeignKeyRule::SetNull,
            Some("SET DEFAULT") => ForeignKeyRule::SetDefault,
            _ => ForeignKeyRule::NoAction,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ForeignKeyRule::NoAction => "no action",
            ForeignKeyRule::Restrict => "restrict",
            ForeignKeyRule::Cascade => "cascade",
            ForeignKeyRule::SetNull => "set null",
            ForeignKeyRule::SetDefault => "set default",
        }
    }
}

/// One (referencing column, referenced column) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnReference {
    pub key_sequence: u32,
    pub foreign_column: String,
    pub primary_column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForeignKey {
    pub name: String,
    /// The referencing table.
    pub foreign_table: TableRef,
    /// The referenced table.
    pub primary_table: TableRef,
    /// Ordered by key sequence.
    pub column_references: Vec<ColumnReference>,
    pub update_rule: ForeignKeyRule,
    pub delete_rule: ForeignKeyRule,
}

// ============================================================================
// Routines
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineKind {
    Procedure,
    Function,
    Unknown,
}

impl RoutineKind {
    pub fn from_vendor(kind: &str) -> Self {
        match kind.trim().to_uppercase().as_str() {
            "PROCEDURE" => RoutineKind::Procedure,
            "FUNCTION" => RoutineKind::Function,
            _ => RoutineKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutineKind::Procedure => "procedure",
            RoutineKind::Function => "function",
            RoutineKind::Unknown => "routine",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Routine {
    pub schema: SchemaRef,
    pub name: String,
    /// Unique within the schema; overloads share `name`.
    pub specific_name: String,
    pub kind: RoutineKind,
    pub return_type: Option<String>,
    pub parameters: Vec<Parameter>,
    pub remarks: Option<String>,
    pub definition: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterMode {
    In,
    Out,
    InOut,
    Return,
    Result,
    Unknown,
}

impl ParameterMode {
    pub fn from_vendor(mode: &str) -> Self {
        match mode.trim().to_uppercase().as_str() {
            "IN" => ParameterMode::In,
            "OUT" => ParameterMode::Out,
            "INOUT" | "IN OUT" => ParameterMode::InOut,
            "RETURN" => ParameterMode::Return,
            "RESULT" => ParameterMode::Result,
            _ => ParameterMode::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterMode::In => "in",
            ParameterMode::Out => "out",
            ParameterMode::InOut => "inout",
            ParameterMode::Return => "return",
            ParameterMode::Result => "result",
            ParameterMode::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub ordinal: u32,
    pub mode: ParameterMode,
    pub type_name: String,
}

// ============================================================================
// Sequences and synonyms
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sequence {
    pub schema: SchemaRef,
    pub name: String,
    pub start: Option<i64>,
    pub increment: Option<i64>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
    pub cycle: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Synonym {
    pub schema: SchemaRef,
    pub name: String,
    pub referenced_object: String,
    /// Set when the referenced object is a table in this catalog.
    pub resolved_table: Option<TableRef>,
}
