//! SQL query templates.
//!
//! A template is SQL text with `${name}` placeholders:
//!
//! | variable        | value                                               |
//! |-----------------|-----------------------------------------------------|
//! | `${table}`      | table name per the catalog's naming, quoted if needed |
//! | `${tablename}`  | bare table name                                     |
//! | `${schema}`     | the table's schema                                  |
//! | `${tabletype}`  | `table`, `view`, ...                                |
//! | `${columns}`    | comma-separated column names, in catalog order      |
//!
//! Every variable is table-scoped: a template using any of them runs once per
//! table, and a template using none runs once, verbatim.

use std::ops::Range;

use crate::catalog::{sql_identifier, Catalog, NameStyle, Table, TableRef};

/// Variables a template may reference.
pub const VARIABLES: [&str; 5] = ["table", "tablename", "schema", "tabletype", "columns"];

/// Template expansion errors. Each one skips a single query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Unknown template variable ${{{name}}}. Supported: {}", VARIABLES.join(", "))]
    UnknownVariable { name: String },

    #[error("Template variable ${{{name}}} needs a table")]
    NoTable { name: String },
}

pub type TemplateResult<T> = Result<T, TemplateError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    sql: String,
}

impl QueryTemplate {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into().trim().to_string(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Variable names in order of appearance, repeats included.
    pub fn variables(&self) -> Vec<&str> {
        placeholders(&self.sql).into_iter().map(|(_, name)| name).collect()
    }

    /// Whether the template runs once per table.
    pub fn is_table_scoped(&self) -> bool {
        self.variables().iter().any(|v| VARIABLES.contains(v))
    }

    /// Substitute every variable for `table`, or check that there is
    /// nothing to substitute when `table` is `None`.
    pub fn expand(&self, catalog: Option<&Catalog>, table: Option<&Table>) -> TemplateResult<String> {
        let mut expanded = String::with_capacity(self.sql.len());
        let mut last = 0;

        for (span, name) in placeholders(&self.sql) {
            if !VARIABLES.contains(&name) {
                return Err(TemplateError::UnknownVariable {
                    name: name.to_string(),
                });
            }
            let (Some(catalog), Some(table)) = (catalog, table) else {
                return Err(TemplateError::NoTable {
                    name: name.to_string(),
                });
            };

            expanded.push_str(&self.sql[last..span.start]);
            expanded.push_str(&value(name, catalog, table));
            last = span.end;
        }

        expanded.push_str(&self.sql[last..]);
        Ok(expanded)
    }
}

/// Every `${name}` in `sql`: its byte span and trimmed name. An unclosed
/// `${` is left as text.
fn placeholders(sql: &str) -> Vec<(Range<usize>, &str)> {
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(offset) = sql[from..].find("${") {
        let start = from + offset;
        let Some(len) = sql[start + 2..].find('}') else {
            break;
        };
        let end = start + 2 + len + 1;
        found.push((start..end, sql[start + 2..end - 1].trim()));
        from = end;
    }
    found
}

fn value(name: &str, catalog: &Catalog, table: &Table) -> String {
    match name {
        "table" => table_sql(catalog.naming, &table.id),
        "tablename" => table.id.name.clone(),
        "schema" => table.id.schema.full_name(),
        "tabletype" => table.kind.as_str().to_string(),
        _ => table
            .columns
            .iter()
            .map(|c| sql_identifier(&c.name))
            .collect::<Vec<_>>()
            .join(", "),
    }
}

/// A table reference usable in SQL under `naming`.
fn table_sql(naming: NameStyle, id: &TableRef) -> String {
    match naming {
        NameStyle::Qualified => [
            id.schema.catalog.as_deref(),
            id.schema.schema.as_deref(),
            Some(id.name.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(sql_identifier)
        .collect::<Vec<_>>()
        .join("."),
        NameStyle::Unqualified | NameStyle::Portable => sql_identifier(&id.name),
    }
}
