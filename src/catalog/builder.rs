//! Catalog assembly from filtered metadata records.
//!
//! Construction happens in three phases:
//! - Phase 1: merge duplicate records into entities and attach children
//!   (columns, indexes, parameters) to their owners
//! - Phase 2: resolve cross-references (foreign keys, synonyms) now that
//!   every entity exists
//! - Phase 3: distribute entities into schemas and order everything
//!
//! Every intermediate collection is keyed by identifier, and every merge is
//! commutative, so the result does not depend on the order records arrived
//! in.
//!
//! When columns were retrieved, indexes and foreign keys may only name
//! columns that survived filtering. Any that name a missing column are
//! dropped with a warning.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use super::naming::{SchemaRef, TableRef};
use super::order::{dependency_order, name_order, table_order};
use super::{
    Catalog, Column, ColumnReference, ForeignKey, ForeignKeyRule, Index, IndexKind, Parameter,
    ParameterMode, Routine, RoutineKind, Schema, Sequence, Synonym, Table, TableKind,
};
use crate::config::{CrawlOptions, SortOptions};
use crate::error::{Warning, WarningKind};
use crate::metadata::{
    ColumnRecord, ForeignKeyRecord, IndexRecord, MetadataKind, ParameterRecord, RecordSet,
    RoutineRecord, SequenceRecord, SynonymRecord, TableRecord, UNKNOWN_TYPE,
};

const UNNAMED_PRIMARY_KEY: &str = "PRIMARY KEY";
const UNNAMED_INDEX: &str = "UNNAMED";

/// Insert `value`, or fold it into the entry already present.
fn upsert<K: Ord, V>(map: &mut BTreeMap<K, V>, key: K, value: V, merge: impl FnOnce(&mut V, V)) {
    match map.entry(key) {
        Entry::Vacant(entry) => {
            entry.insert(value);
        }
        Entry::Occupied(mut entry) => merge(entry.get_mut(), value),
    }
}

/// Commutative merge of optional attributes: the greatest present value.
fn merge_opt<T: Ord>(current: &mut Option<T>, other: Option<T>) {
    if other > *current {
        *current = other;
    }
}

fn merge_max<T: Ord>(current: &mut T, other: T) {
    if other > *current {
        *current = other;
    }
}

type RoutineKey = (SchemaRef, String);

struct IndexDraft {
    name: Option<String>,
    primary: bool,
    unique: bool,
    columns: BTreeSet<(u32, String)>,
}

struct KeyDraft {
    name: Option<String>,
    foreign_table: TableRef,
    primary_table: TableRef,
    /// key sequence → (referencing column, referenced column)
    rows: BTreeMap<u32, (String, Option<String>)>,
    update_rule: Option<String>,
    delete_rule: Option<String>,
}

/// Assembles a [`Catalog`] from filtered records.
pub struct CatalogBuilder<'a> {
    options: &'a CrawlOptions,
    warnings: Vec<Warning>,
    /// Column lists are complete, so references to absent columns dangle.
    columns_retrieved: bool,
}

impl<'a> CatalogBuilder<'a> {
    pub fn new(options: &'a CrawlOptions) -> Self {
        Self {
            options,
            warnings: Vec::new(),
            columns_retrieved: false,
        }
    }

    /// Build the catalog. Never fails: anything that cannot be placed is
    /// dropped with a warning.
    pub fn build(mut self, records: RecordSet) -> Catalog {
        let RecordSet {
            database,
            schemas,
            tables,
            columns,
            indexes,
            foreign_keys,
            routines,
            parameters,
            sequences,
            synonyms,
            omitted,
            warnings,
        } = records;
        self.warnings.extend(warnings);
        self.columns_retrieved =
            self.options.plans(MetadataKind::Columns) && !omitted.contains(&MetadataKind::Columns);

        // Phase 1: entities
        let mut tables = self.merge_tables(tables);
        self.attach_columns(&mut tables, columns);
        self.attach_indexes(&mut tables, indexes);
        let mut routines = self.merge_routines(routines);
        self.attach_parameters(&mut routines, parameters);
        let sequences = merge_sequences(sequences);
        let mut synonyms = merge_synonyms(synonyms);

        // Phase 2: references
        self.resolve_foreign_keys(&mut tables, foreign_keys);
        resolve_synonyms(&tables, &mut synonyms);

        // Phase 3: assembly
        let mut by_schema: BTreeMap<SchemaRef, Schema> = schemas
            .into_iter()
            .map(|record| (record.schema.clone(), Schema::new(record.schema)))
            .collect();
        for (id, table) in tables {
            schema_entry(&mut by_schema, id.schema).tables.push(table);
        }
        for ((id, _), routine) in routines {
            schema_entry(&mut by_schema, id).routines.push(routine);
        }
        for ((id, _), sequence) in sequences {
            schema_entry(&mut by_schema, id).sequences.push(sequence);
        }
        for ((id, _), synonym) in synonyms {
            schema_entry(&mut by_schema, id).synonyms.push(synonym);
        }

        let mut schemas: Vec<Schema> = by_schema.into_values().collect();
        schemas.sort_by(|a, b| {
            a.id.full_name()
                .cmp(&b.id.full_name())
                .then_with(|| a.id.cmp(&b.id))
        });
        for schema in &mut schemas {
            self.order_schema(schema);
        }

        let mut warnings = self.warnings;
        warnings.sort();
        warnings.dedup();

        debug!(
            schemas = schemas.len(),
            warnings = warnings.len(),
            "catalog built"
        );

        Catalog {
            database,
            schemas,
            naming: self.options.naming,
            omitted,
            columns_retrieved: self.columns_retrieved,
            warnings,
        }
    }

    fn warn(&mut self, kind: WarningKind, message: String) {
        warn!(?kind, "{message}");
        self.warnings.push(Warning::new(kind, message));
    }

    /// The first of `columns` that `table` does not have, if columns were
    /// retrieved at all.
    fn first_missing<'c>(
        &self,
        table: Option<&Table>,
        mut columns: impl Iterator<Item = &'c String>,
    ) -> Option<&'c String> {
        if !self.columns_retrieved {
            return None;
        }
        columns.find(|column| table.and_then(|t| t.column(column)).is_none())
    }

    // ========================================================================
    // Phase 1: Entities
    // ========================================================================

    fn merge_tables(&mut self, records: Vec<TableRecord>) -> BTreeMap<TableRef, Table> {
        let mut tables = BTreeMap::new();
        for record in records {
            let table = Table {
                id: record.table.clone(),
                kind: TableKind::from_vendor(&record.kind),
                columns: Vec::new(),
                primary_key: None,
                indexes: Vec::new(),
                foreign_keys: Vec::new(),
                remarks: record.remarks,
                definition: record.definition,
            };
            upsert(&mut tables, record.table, table, |current, other| {
                merge_max(&mut current.kind, other.kind);
                merge_opt(&mut current.remarks, other.remarks);
                merge_opt(&mut current.definition, other.definition);
            });
        }
        tables
    }

    fn attach_columns(&mut self, tables: &mut BTreeMap<TableRef, Table>, records: Vec<ColumnRecord>) {
        let mut grouped: BTreeMap<TableRef, BTreeMap<String, Column>> = BTreeMap::new();
        let mut orphaned: BTreeSet<TableRef> = BTreeSet::new();

        for record in records {
            if !tables.contains_key(&record.table) {
                orphaned.insert(record.table);
                continue;
            }
            let column = Column {
                table: record.table.clone(),
                name: record.name.clone(),
                ordinal: record.ordinal.unwrap_or(0),
                type_name: record
                    .type_name
                    .unwrap_or_else(|| UNKNOWN_TYPE.to_string()),
                nullable: record.nullable.unwrap_or(true),
                default_value: record.default_value,
                remarks: record.remarks,
                part_of_primary_key: false,
                part_of_foreign_key: false,
            };
            upsert(
                grouped.entry(record.table).or_default(),
                record.name,
                column,
                |current, other| {
                    merge_max(&mut current.ordinal, other.ordinal);
                    merge_max(&mut current.type_name, other.type_name);
                    merge_max(&mut current.nullable, other.nullable);
                    merge_opt(&mut current.default_value, other.default_value);
                    merge_opt(&mut current.remarks, other.remarks);
                },
            );
        }

        for (id, columns) in grouped {
            if let Some(table) = tables.get_mut(&id) {
                table.columns = columns.into_values().collect();
            }
        }
        for id in orphaned {
            self.warn(
                WarningKind::OrphanedEntity,
                format!("columns of {id} dropped: table not in catalog"),
            );
        }
    }

    fn attach_indexes(&mut self, tables: &mut BTreeMap<TableRef, Table>, records: Vec<IndexRecord>) {
        // The primary key groups under an empty name, whatever it is called.
        let mut grouped: BTreeMap<TableRef, BTreeMap<(bool, String), IndexDraft>> = BTreeMap::new();
        let mut orphaned: BTreeSet<TableRef> = BTreeSet::new();

        for record in records {
            if !tables.contains_key(&record.table) {
                orphaned.insert(record.table);
                continue;
            }
            let key = if record.primary {
                (false, String::new())
            } else {
                (
                    true,
                    record
                        .name
                        .clone()
                        .unwrap_or_else(|| UNNAMED_INDEX.to_string()),
                )
            };
            let draft = IndexDraft {
                name: record.name,
                primary: record.primary,
                unique: record.unique || record.primary,
                columns: BTreeSet::from([(record.position, record.column)]),
            };
            upsert(
                grouped.entry(record.table).or_default(),
                key,
                draft,
                |current, other| {
                    merge_opt(&mut current.name, other.name);
                    current.unique |= other.unique;
                    current.columns.extend(other.columns);
                },
            );
        }

        for (id, drafts) in grouped {
            let Some(table) = tables.get_mut(&id) else {
                continue;
            };
            for ((_, key_name), draft) in drafts {
                let mut columns: Vec<String> = Vec::with_capacity(draft.columns.len());
                for (_, column) in draft.columns {
                    if !columns.contains(&column) {
                        columns.push(column);
                    }
                }
                let (name, kind) = if draft.primary {
                    let name = draft
                        .name
                        .unwrap_or_else(|| UNNAMED_PRIMARY_KEY.to_string());
                    (name, IndexKind::Primary)
                } else if draft.unique {
                    (key_name, IndexKind::Unique)
                } else {
                    (key_name, IndexKind::NonUnique)
                };
                if let Some(missing) = self.first_missing(Some(&*table), columns.iter()) {
                    let what = if kind == IndexKind::Primary {
                        "primary key".to_string()
                    } else {
                        format!("index {name}")
                    };
                    self.warn(
                        WarningKind::UnresolvedReference,
                        format!("{what} of {id} dropped: column {missing} not in catalog"),
                    );
                    continue;
                }
                let index = Index {
                    name,
                    kind,
                    columns,
                };
                if kind == IndexKind::Primary {
                    for column in &mut table.columns {
                        column.part_of_primary_key = index.columns.contains(&column.name);
                    }
                    table.primary_key = Some(index);
                } else {
                    table.indexes.push(index);
                }
            }
        }
        for id in orphaned {
            self.warn(
                WarningKind::OrphanedEntity,
                format!("indexes of {id} dropped: table not in catalog"),
            );
        }
    }

    fn merge_routines(&mut self, records: Vec<RoutineRecord>) -> BTreeMap<RoutineKey, Routine> {
        let mut routines = BTreeMap::new();
        for record in records {
            let specific_name = record
                .specific_name
                .unwrap_or_else(|| record.name.clone());
            let key = (record.schema.clone(), specific_name.clone());
            let routine = Routine {
                schema: record.schema,
                name: record.name,
                specific_name,
                kind: RoutineKind::from_vendor(&record.kind),
                return_type: record.return_type,
                parameters: Vec::new(),
                remarks: record.remarks,
                definition: record.definition,
            };
            upsert(&mut routines, key, routine, |current, other| {
                merge_max(&mut current.name, other.name);
                merge_max(&mut current.kind, other.kind);
                merge_opt(&mut current.return_type, other.return_type);
                merge_opt(&mut current.remarks, other.remarks);
                merge_opt(&mut current.definition, other.definition);
            });
        }
        routines
    }

    fn attach_parameters(
        &mut self,
        routines: &mut BTreeMap<RoutineKey, Routine>,
        records: Vec<ParameterRecord>,
    ) {
        let mut grouped: BTreeMap<RoutineKey, BTreeMap<String, Parameter>> = BTreeMap::new();
        let mut orphaned: BTreeSet<String> = BTreeSet::new();

        for record in records {
            let specific_name = record
                .specific_name
                .unwrap_or_else(|| record.routine.clone());
            let key = (record.schema, specific_name);
            if !routines.contains_key(&key) {
                orphaned.insert(super::qualify(&key.0, &key.1));
                continue;
            }
            let name = record
                .name
                .unwrap_or_else(|| record.ordinal.to_string());
            let parameter = Parameter {
                name: name.clone(),
                ordinal: record.ordinal,
                mode: ParameterMode::from_vendor(&record.mode),
                type_name: record
                    .type_name
                    .unwrap_or_else(|| UNKNOWN_TYPE.to_string()),
            };
            upsert(
                grouped.entry(key).or_default(),
                name,
                parameter,
                |current, other| {
                    merge_max(&mut current.ordinal, other.ordinal);
                    merge_max(&mut current.mode, other.mode);
                    merge_max(&mut current.type_name, other.type_name);
                },
            );
        }

        for (key, parameters) in grouped {
            if let Some(routine) = routines.get_mut(&key) {
                routine.parameters = parameters.into_values().collect();
            }
        }
        for routine in orphaned {
            self.warn(
                WarningKind::OrphanedEntity,
                format!("parameters of {routine} dropped: routine not in catalog"),
            );
        }
    }

    // ========================================================================
    // Phase 2: References
    // ========================================================================

    fn resolve_foreign_keys(
        &mut self,
        tables: &mut BTreeMap<TableRef, Table>,
        records: Vec<ForeignKeyRecord>,
    ) {
        let mut drafts: BTreeMap<(TableRef, String, TableRef), KeyDraft> = BTreeMap::new();

        for record in records {
            let group = record
                .name
                .clone()
                .unwrap_or_else(|| record.primary_table.full_name());
            let key = (
                record.foreign_table.clone(),
                group,
                record.primary_table.clone(),
            );
            let draft = KeyDraft {
                name: record.name,
                foreign_table: record.foreign_table,
                primary_table: record.primary_table,
                rows: BTreeMap::from([(
                    record.key_sequence,
                    (record.foreign_column, record.primary_column),
                )]),
                update_rule: record.update_rule,
                delete_rule: record.delete_rule,
            };
            upsert(&mut drafts, key, draft, |current, other| {
                merge_opt(&mut current.update_rule, other.update_rule);
                merge_opt(&mut current.delete_rule, other.delete_rule);
                for (sequence, pair) in other.rows {
                    // Conflicting rows for one position: keep the least.
                    upsert(&mut current.rows, sequence, pair, |kept, pair| {
                        if pair < *kept {
                            *kept = pair;
                        }
                    });
                }
            });
        }

        for draft in drafts.into_values() {
            if let Some(key) = self.resolve_key(tables, draft) {
                attach_key(tables, key);
            }
        }
    }

    /// Turn a draft into a foreign key, or warn and drop it.
    fn resolve_key(
        &mut self,
        tables: &BTreeMap<TableRef, Table>,
        draft: KeyDraft,
    ) -> Option<ForeignKey> {
        let name = draft.name.unwrap_or_else(|| {
            format!(
                "{}_{}_FK",
                draft.foreign_table.name, draft.primary_table.name
            )
        });

        let missing = [&draft.foreign_table, &draft.primary_table]
            .into_iter()
            .find(|id| !tables.contains_key(*id));
        if let Some(missing) = missing {
            self.warn(
                WarningKind::UnresolvedReference,
                format!(
                    "foreign key {name} ({} -> {}) dropped: {missing} not in catalog",
                    draft.foreign_table, draft.primary_table
                ),
            );
            return None;
        }

        let primary_key: &[String] = tables
            .get(&draft.primary_table)
            .and_then(|t| t.primary_key.as_ref())
            .map(|pk| pk.columns.as_slice())
            .unwrap_or_default();

        let mut column_references = Vec::with_capacity(draft.rows.len());
        for (position, (key_sequence, (foreign_column, primary_column))) in
            draft.rows.into_iter().enumerate()
        {
            // A missing target column means the target's primary key column
            // at the same position.
            let Some(primary_column) = primary_column.or_else(|| primary_key.get(position).cloned())
            else {
                self.warn(
                    WarningKind::UnresolvedReference,
                    format!(
                        "foreign key {name} ({} -> {}) dropped: no referenced column for {foreign_column}",
                        draft.foreign_table, draft.primary_table
                    ),
                );
                return None;
            };
            column_references.push(ColumnReference {
                key_sequence,
                foreign_column,
                primary_column,
            });
        }

        let foreign_columns: Vec<&String> =
            column_references.iter().map(|r| &r.foreign_column).collect();
        let primary_columns: Vec<&String> =
            column_references.iter().map(|r| &r.primary_column).collect();
        for (end, columns) in [
            (&draft.foreign_table, foreign_columns),
            (&draft.primary_table, primary_columns),
        ] {
            if let Some(missing) = self.first_missing(tables.get(end), columns.into_iter()) {
                self.warn(
                    WarningKind::UnresolvedReference,
                    format!(
                        "foreign key {name} ({} -> {}) dropped: column {end}.{missing} not in catalog",
                        draft.foreign_table, draft.primary_table
                    ),
                );
                return None;
            }
        }

        Some(ForeignKey {
            name,
            foreign_table: draft.foreign_table,
            primary_table: draft.primary_table,
            column_references,
            update_rule: ForeignKeyRule::from_vendor(draft.update_rule.as_deref()),
            delete_rule: ForeignKeyRule::from_vendor(draft.delete_rule.as_deref()),
        })
    }

    // ========================================================================
    // Phase 3: Ordering
    // ========================================================================

    fn order_schema(&mut self, schema: &mut Schema) {
        let sort = self.options.sort;

        for table in &mut schema.tables {
            order_table(table, sort);
        }

        if sort.tables {
            schema.tables.sort_by(|a, b| table_order(&a.id, &b.id));
        } else {
            let ids: Vec<TableRef> = schema.tables.iter().map(|t| t.id.clone()).collect();
            let references: Vec<(TableRef, TableRef)> = schema
                .tables
                .iter()
                .flat_map(|t| t.imported_keys())
                .map(|fk| (fk.primary_table.clone(), fk.foreign_table.clone()))
                .collect();
            let ordered = dependency_order(&ids, references.iter().map(|(p, f)| (p, f)));

            for cycle in &ordered.cycles {
                let names: Vec<String> = cycle.iter().map(TableRef::full_name).collect();
                self.warn(
                    WarningKind::DependencyCycle,
                    format!("foreign keys form a cycle: {}", names.join(", ")),
                );
            }

            let position: BTreeMap<&TableRef, usize> = ordered
                .order
                .iter()
                .enumerate()
                .map(|(i, id)| (id, i))
                .collect();
            schema
                .tables
                .sort_by_key(|t| position.get(&t.id).copied().unwrap_or(usize::MAX));
        }

        for routine in &mut schema.routines {
            if sort.parameters {
                routine.parameters.sort_by(|a, b| name_order(&a.name, &b.name));
            } else {
                routine
                    .parameters
                    .sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.name.cmp(&b.name)));
            }
        }
        if sort.routines {
            schema.routines.sort_by(|a, b| {
                name_order(&a.name, &b.name)
                    .then_with(|| name_order(&a.specific_name, &b.specific_name))
            });
        } else {
            schema
                .routines
                .sort_by(|a, b| name_order(&a.specific_name, &b.specific_name));
        }

        schema.sequences.sort_by(|a, b| name_order(&a.name, &b.name));
        schema.synonyms.sort_by(|a, b| name_order(&a.name, &b.name));
    }
}

fn schema_entry(schemas: &mut BTreeMap<SchemaRef, Schema>, id: SchemaRef) -> &mut Schema {
    schemas
        .entry(id.clone())
        .or_insert_with(|| Schema::new(id))
}

/// File a resolved key under both of its tables.
fn attach_key(tables: &mut BTreeMap<TableRef, Table>, key: ForeignKey) {
    if let Some(table) = tables.get_mut(&key.foreign_table) {
        for column in &mut table.columns {
            if key
                .column_references
                .iter()
                .any(|r| r.foreign_column == column.name)
            {
                column.part_of_foreign_key = true;
            }
        }
        table.foreign_keys.push(key.clone());
    }
    if key.primary_table != key.foreign_table {
        if let Some(table) = tables.get_mut(&key.primary_table) {
            table.foreign_keys.push(key);
        }
    }
}

fn order_table(table: &mut Table, sort: SortOptions) {
    if sort.columns {
        table.columns.sort_by(|a, b| name_order(&a.name, &b.name));
    } else {
        table
            .columns
            .sort_by(|a, b| a.ordinal.cmp(&b.ordinal).then_with(|| a.name.cmp(&b.name)));
    }
    table.indexes.sort_by(|a, b| name_order(&a.name, &b.name));
    table.foreign_keys.sort_by(|a, b| {
        name_order(&a.name, &b.name)
            .then_with(|| a.foreign_table.cmp(&b.foreign_table))
            .then_with(|| a.primary_table.cmp(&b.primary_table))
    });
}

fn merge_sequences(records: Vec<SequenceRecord>) -> BTreeMap<RoutineKey, Sequence> {
    let mut sequences = BTreeMap::new();
    for record in records {
        let key = (record.schema.clone(), record.name.clone());
        let sequence = Sequence {
            schema: record.schema,
            name: record.name,
            start: record.start,
            increment: record.increment,
            minimum: record.minimum,
            maximum: record.maximum,
            cycle: record.cycle,
        };
        upsert(&mut sequences, key, sequence, |current, other| {
            merge_opt(&mut current.start, other.start);
            merge_opt(&mut current.increment, other.increment);
            merge_opt(&mut current.minimum, other.minimum);
            merge_opt(&mut current.maximum, other.maximum);
            current.cycle |= other.cycle;
        });
    }
    sequences
}

fn merge_synonyms(records: Vec<SynonymRecord>) -> BTreeMap<RoutineKey, Synonym> {
    let mut synonyms = BTreeMap::new();
    for record in records {
        let key = (record.schema.clone(), record.name.clone());
        let synonym = Synonym {
            schema: record.schema,
            name: record.name,
            referenced_object: record.referenced_object.trim().to_string(),
            resolved_table: None,
        };
        upsert(&mut synonyms, key, synonym, |current, other| {
            merge_max(&mut current.referenced_object, other.referenced_object);
        });
    }
    synonyms
}

/// Point synonyms at the tables they alias. An unqualified target is looked
/// up in the synonym's own schema.
fn resolve_synonyms(tables: &BTreeMap<TableRef, Table>, synonyms: &mut BTreeMap<RoutineKey, Synonym>) {
    for synonym in synonyms.values_mut() {
        let target = &synonym.referenced_object;
        synonym.resolved_table = tables
            .keys()
            .find(|id| {
                id.full_name() == *target || (id.schema == synonym.schema && id.name == *target)
            })
            .cloned();
    }
}
