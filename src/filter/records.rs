//! Pruning a [`RecordSet`] with a [`RuleSet`].

use std::collections::HashSet;

use tracing::debug;

use super::{Category, RuleSet};
use crate::catalog::{qualify, SchemaRef, TableRef};
use crate::error::{Warning, WarningKind};
use crate::metadata::RecordSet;

/// Drop every record the rules exclude.
///
/// The schema rule runs first and short-circuits: objects in an excluded
/// schema never reach their own rule. Columns and indexes survive only with
/// their table, parameters only with their routine. Foreign keys are left to
/// the catalog builder, which drops the ones whose endpoints are gone.
pub fn apply(records: RecordSet, rules: &RuleSet) -> RecordSet {
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
        mut warnings,
    } = records;

    let schema_ok = |schema: &SchemaRef| rules.included(Category::Schema, &schema.full_name());

    let schemas = retain(
        schemas,
        Category::Schema,
        rules,
        |_| true,
        |s| s.schema.full_name(),
        &mut warnings,
    );

    let tables = retain(
        tables,
        Category::Table,
        rules,
        |t| schema_ok(&t.table.schema),
        |t| t.table.full_name(),
        &mut warnings,
    );
    let kept_tables: HashSet<&TableRef> = tables.iter().map(|t| &t.table).collect();

    let columns = retain(
        columns,
        Category::Column,
        rules,
        |c| kept_tables.contains(&c.table),
        |c| format!("{}.{}", c.table.full_name(), c.name),
        &mut warnings,
    );
    let indexes = indexes
        .into_iter()
        .filter(|i| kept_tables.contains(&i.table))
        .collect();

    let routines = retain(
        routines,
        Category::Routine,
        rules,
        |r| schema_ok(&r.schema),
        |r| qualify(&r.schema, &r.name),
        &mut warnings,
    );
    let kept_routines: HashSet<String> = routines
        .iter()
        .map(|r| qualify(&r.schema, r.specific_name.as_deref().unwrap_or(&r.name)))
        .collect();

    let parameters = retain(
        parameters,
        Category::Parameter,
        rules,
        |p| {
            let specific = p.specific_name.as_deref().unwrap_or(&p.routine);
            kept_routines.contains(&qualify(&p.schema, specific))
        },
        |p| {
            let name = p.name.clone().unwrap_or_else(|| p.ordinal.to_string());
            format!("{}.{}", qualify(&p.schema, &p.routine), name)
        },
        &mut warnings,
    );

    let sequences = retain(
        sequences,
        Category::Sequence,
        rules,
        |s| schema_ok(&s.schema),
        |s| qualify(&s.schema, &s.name),
        &mut warnings,
    );

    let synonyms = retain(
        synonyms,
        Category::Synonym,
        rules,
        |s| schema_ok(&s.schema),
        |s| qualify(&s.schema, &s.name),
        &mut warnings,
    );

    debug!(
        tables = tables.len(),
        routines = routines.len(),
        "applied inclusion rules"
    );

    RecordSet {
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
    }
}

/// Keep the items whose parent survived and whose identifier passes the
/// category rule. Warns when a usable include pattern matched nothing.
fn retain<T>(
    items: Vec<T>,
    category: Category,
    rules: &RuleSet,
    parent_ok: impl Fn(&T) -> bool,
    identifier: impl Fn(&T) -> String,
    warnings: &mut Vec<Warning>,
) -> Vec<T> {
    let rule = rules.rule(category);
    let mut candidates = 0usize;

    let kept: Vec<T> = items
        .into_iter()
        .filter(|item| parent_ok(item))
        .filter(|item| {
            candidates += 1;
            rule.test(&identifier(item))
        })
        .collect();

    if kept.is_empty() && candidates > 0 && !rule.excludes_all() {
        warnings.push(Warning::new(
            WarningKind::EmptyMatch,
            format!(
                "{} pattern include={:?} exclude={:?} matched none of {} candidates",
                category,
                rule.include_pattern(),
                rule.exclude_pattern(),
                candidates
            ),
        ));
    }

    kept
}
