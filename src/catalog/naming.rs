//! Identifiers for catalog entities and how their names are rendered.
//!
//! Entities never hold pointers to each other; they refer to one another by
//! these identifier values, which stay valid no matter in which order the
//! underlying records arrived.

use std::fmt;

use serde::Serialize;

/// Trim a raw name, mapping empty strings to `None`.
///
/// Drivers disagree on whether a missing catalog or schema is reported as
/// NULL or as an empty string; both mean "absent".
pub fn clean_name(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn join_qualified<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> String {
    parts.into_iter().flatten().collect::<Vec<_>>().join(".")
}

/// A catalog + schema namespace. Either part may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SchemaRef {
    pub catalog: Option<String>,
    pub schema: Option<String>,
}

impl SchemaRef {
    pub fn new(catalog: Option<&str>, schema: Option<&str>) -> Self {
        Self {
            catalog: clean_name(catalog),
            schema: clean_name(schema),
        }
    }

    /// A schema with no catalog.
    pub fn named(schema: &str) -> Self {
        Self::new(None, Some(schema))
    }

    /// `catalog.schema`, skipping absent parts.
    pub fn full_name(&self) -> String {
        join_qualified([self.catalog.as_deref(), self.schema.as_deref()])
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_none() && self.schema.is_none()
    }

    pub fn table(&self, name: &str) -> TableRef {
        TableRef::new(self.clone(), name)
    }
}

impl fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// A table (or view) within a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TableRef {
    pub schema: SchemaRef,
    pub name: String,
}

impl TableRef {
    pub fn new(schema: SchemaRef, name: &str) -> Self {
        Self {
            schema,
            name: name.trim().to_string(),
        }
    }

    pub fn full_name(&self) -> String {
        qualify(&self.schema, &self.name)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}

/// Qualify `name` with a schema's full name.
pub fn qualify(schema: &SchemaRef, name: &str) -> String {
    join_qualified([
        schema.catalog.as_deref(),
        schema.schema.as_deref(),
        Some(name),
    ])
}

/// How entity names are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NameStyle {
    /// Fully qualified with catalog and schema.
    #[default]
    Qualified,
    /// Object names without qualifiers; schemas are still shown.
    Unqualified,
    /// Independent of catalog, schema and database product, so output can
    /// be compared across databases.
    Portable,
}

impl NameStyle {
    pub fn object_name(&self, schema: &SchemaRef, name: &str) -> String {
        match self {
            NameStyle::Qualified => qualify(schema, name),
            NameStyle::Unqualified | NameStyle::Portable => name.to_string(),
        }
    }

    pub fn table_name(&self, table: &TableRef) -> String {
        self.object_name(&table.schema, &table.name)
    }

    pub fn shows_schemas(&self) -> bool {
        !matches!(self, NameStyle::Portable)
    }

    pub fn shows_database_info(&self) -> bool {
        !matches!(self, NameStyle::Portable)
    }
}

// =============================================================================
// Identifier Quoting
// =============================================================================

/// Quote an identifier with double quotes (ANSI style).
pub fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Whether `ident` can appear in SQL without quoting.
pub fn is_plain_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Quote `ident` only when it needs it.
pub fn sql_identifier(ident: &str) -> String {
    if is_plain_identifier(ident) {
        ident.to_string()
    } else {
        quote_identifier(ident)
    }
}
