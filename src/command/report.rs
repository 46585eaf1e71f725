//! Report documents built from a catalog.
//!
//! A report is a plain, already-ordered projection of the catalog at one
//! detail level. Renderers walk it without looking back at the catalog, so
//! the text and JSON outputs always agree.

use std::fmt;

use serde::Serialize;

use crate::catalog::{Catalog, ForeignKey, Routine, Schema, Sequence, Synonym, Table};
use crate::metadata::DatabaseInfo;

/// Built-in report commands, in increasing detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// Object names and kinds.
    List,
    /// Adds columns with types, routine parameters and synonym targets.
    Brief,
    /// Adds keys, indexes, nullability and defaults.
    Schema,
    /// Adds remarks, definitions and sequence attributes.
    Details,
}

impl ReportKind {
    pub const ALL: [ReportKind; 4] = [
        ReportKind::List,
        ReportKind::Brief,
        ReportKind::Schema,
        ReportKind::Details,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::List => "list",
            ReportKind::Brief => "brief",
            ReportKind::Schema => "schema",
            ReportKind::Details => "details",
        }
    }

    /// Look up a report by command name, ignoring case.
    pub fn from_name(name: &str) -> Option<Self> {
        ReportKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub kind: ReportKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseInfo>,
    pub schemas: Vec<SchemaReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaReport {
    /// `None` when names are portable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub tables: Vec<TableReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routines: Vec<RoutineReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sequences: Vec<SequenceReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub synonyms: Vec<SynonymReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableReport {
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKeyReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnReport {
    pub name: String,
    pub type_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForeignKeyReport {
    pub name: String,
    pub foreign_table: String,
    pub primary_table: String,
    /// (referencing column, referenced column) pairs.
    pub columns: Vec<(String, String)>,
    pub update_rule: String,
    pub delete_rule: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexReport {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutineReport {
    pub name: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterReport {
    pub name: String,
    pub mode: String,
    pub type_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<SequenceAttributes>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SequenceAttributes {
    pub start: Option<i64>,
    pub increment: Option<i64>,
    pub minimum: Option<i64>,
    pub maximum: Option<i64>,
    pub cycle: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynonymReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced_object: Option<String>,
}

impl Report {
    /// Project `catalog` at `kind`'s detail level.
    pub fn build(catalog: &Catalog, kind: ReportKind, show_database_info: bool) -> Self {
        let builder = ReportBuilder { catalog, kind };
        Report {
            kind,
            database: (show_database_info && catalog.naming.shows_database_info())
                .then(|| catalog.database.clone()),
            schemas: catalog.schemas.iter().map(|s| builder.schema(s)).collect(),
        }
    }
}

struct ReportBuilder<'a> {
    catalog: &'a Catalog,
    kind: ReportKind,
}

impl ReportBuilder<'_> {
    fn at_least(&self, kind: ReportKind) -> bool {
        self.kind >= kind
    }

    fn schema(&self, schema: &Schema) -> SchemaReport {
        SchemaReport {
            name: self
                .catalog
                .naming
                .shows_schemas()
                .then(|| schema.id.full_name())
                .filter(|name| !name.is_empty()),
            tables: schema.tables.iter().map(|t| self.table(t)).collect(),
            routines: schema.routines.iter().map(|r| self.routine(r)).collect(),
            sequences: schema.sequences.iter().map(|s| self.sequence(s)).collect(),
            synonyms: schema.synonyms.iter().map(|s| self.synonym(s)).collect(),
        }
    }

    fn table(&self, table: &Table) -> TableReport {
        let brief = self.at_least(ReportKind::Brief);
        let schema = self.at_least(ReportKind::Schema);
        let details = self.at_least(ReportKind::Details);

        TableReport {
            name: self.catalog.table_name(&table.id),
            kind: table.kind.as_str().to_string(),
            columns: if brief {
                table
                    .columns
                    .iter()
                    .map(|c| ColumnReport {
                        name: c.name.clone(),
                        type_name: c.type_name.clone(),
                        nullable: schema.then_some(c.nullable),
                        default_value: c.default_value.clone().filter(|_| schema),
                        remarks: c.remarks.clone().filter(|_| details),
                    })
                    .collect()
            } else {
                Vec::new()
            },
            primary_key: table
                .primary_key
                .as_ref()
                .filter(|_| schema)
                .map(|pk| pk.columns.clone()),
            foreign_keys: if schema {
                table.foreign_keys.iter().map(|k| self.foreign_key(k)).collect()
            } else {
                Vec::new()
            },
            indexes: if schema {
                table
                    .indexes
                    .iter()
                    .map(|i| IndexReport {
                        name: i.name.clone(),
                        unique: i.kind != crate::catalog::IndexKind::NonUnique,
                        columns: i.columns.clone(),
                    })
                    .collect()
            } else {
                Vec::new()
            },
            remarks: table.remarks.clone().filter(|_| details),
            definition: table.definition.clone().filter(|_| details),
        }
    }

    fn foreign_key(&self, key: &ForeignKey) -> ForeignKeyReport {
        ForeignKeyReport {
            name: key.name.clone(),
            foreign_table: self.catalog.table_name(&key.foreign_table),
            primary_table: self.catalog.table_name(&key.primary_table),
            columns: key
                .column_references
                .iter()
                .map(|r| (r.foreign_column.clone(), r.primary_column.clone()))
                .collect(),
            update_rule: key.update_rule.as_str().to_string(),
            delete_rule: key.delete_rule.as_str().to_string(),
        }
    }

    fn routine(&self, routine: &Routine) -> RoutineReport {
        let brief = self.at_least(ReportKind::Brief);
        let details = self.at_least(ReportKind::Details);

        RoutineReport {
            name: self.catalog.object_name(&routine.schema, &routine.name),
            kind: routine.kind.as_str().to_string(),
            return_type: routine.return_type.clone().filter(|_| brief),
            parameters: if brief {
                routine
                    .parameters
                    .iter()
                    .map(|p| ParameterReport {
                        name: p.name.clone(),
                        mode: p.mode.as_str().to_string(),
                        type_name: p.type_name.clone(),
                    })
                    .collect()
            } else {
                Vec::new()
            },
            remarks: routine.remarks.clone().filter(|_| details),
            definition: routine.definition.clone().filter(|_| details),
        }
    }

    fn sequence(&self, sequence: &Sequence) -> SequenceReport {
        SequenceReport {
            name: self.catalog.object_name(&sequence.schema, &sequence.name),
            attributes: self.at_least(ReportKind::Details).then(|| SequenceAttributes {
                start: sequence.start,
                increment: sequence.increment,
                minimum: sequence.minimum,
                maximum: sequence.maximum,
                cycle: sequence.cycle,
            }),
        }
    }

    fn synonym(&self, synonym: &Synonym) -> SynonymReport {
        SynonymReport {
            name: self.catalog.object_name(&synonym.schema, &synonym.name),
            referenced_object: self
                .at_least(ReportKind::Brief)
                .then(|| synonym.referenced_object.clone()),
        }
    }
}
