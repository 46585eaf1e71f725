//! Structural invariants of a built catalog.

use std::collections::HashSet;

use super::{Catalog, ForeignKey, TableRef};
use crate::error::{CrawlError, CrawlResult};

impl Catalog {
    /// Check that ownership and references are consistent:
    /// - every column's table is the table that owns it
    /// - both tables of every foreign key are in the catalog
    /// - index and foreign key columns exist, when columns were retrieved
    /// - no identifier repeats within its scope
    ///
    /// A violation means a builder bug, not bad metadata.
    pub fn validate(&self) -> CrawlResult<()> {
        let mut schemas = HashSet::new();
        let mut tables: HashSet<&TableRef> = HashSet::new();

        for schema in &self.schemas {
            if !schemas.insert(&schema.id) {
                return Err(violation(format!("duplicate schema {}", schema.id)));
            }
            for table in &schema.tables {
                if table.id.schema != schema.id {
                    return Err(violation(format!(
                        "table {} filed under schema {}",
                        table.id, schema.id
                    )));
                }
                if !tables.insert(&table.id) {
                    return Err(violation(format!("duplicate table {}", table.id)));
                }
                unique(
                    table.columns.iter().map(|c| c.name.as_str()),
                    &format!("column in {}", table.id),
                )?;
                unique(
                    table.indexes.iter().map(|i| i.name.as_str()),
                    &format!("index in {}", table.id),
                )?;
                if let Some(column) = table.columns.iter().find(|c| c.table != table.id) {
                    return Err(violation(format!(
                        "column {} of {} claims owner {}",
                        column.name, table.id, column.table
                    )));
                }
                if self.columns_retrieved {
                    for index in table.primary_key.iter().chain(&table.indexes) {
                        let missing = index.columns.iter().find(|c| table.column(c).is_none());
                        if let Some(column) = missing {
                            return Err(violation(format!(
                                "index {} of {} names missing column {}",
                                index.name, table.id, column
                            )));
                        }
                    }
                }
            }
            unique(
                schema.routines.iter().map(|r| r.specific_name.as_str()),
                &format!("routine in {}", schema.id),
            )?;
            unique(
                schema.sequences.iter().map(|s| s.name.as_str()),
                &format!("sequence in {}", schema.id),
            )?;
            unique(
                schema.synonyms.iter().map(|s| s.name.as_str()),
                &format!("synonym in {}", schema.id),
            )?;
        }

        for table in self.tables() {
            for key in &table.foreign_keys {
                for end in [&key.foreign_table, &key.primary_table] {
                    if !tables.contains(end) {
                        return Err(violation(format!(
                            "foreign key {} references missing table {}",
                            key.name, end
                        )));
                    }
                }
                if key.foreign_table != table.id && key.primary_table != table.id {
                    return Err(violation(format!(
                        "foreign key {} filed under unrelated table {}",
                        key.name, table.id
                    )));
                }
                if self.columns_retrieved {
                    self.check_key_columns(key)?;
                }
            }
        }

        Ok(())
    }
}

impl Catalog {
    fn check_key_columns(&self, key: &ForeignKey) -> CrawlResult<()> {
        for reference in &key.column_references {
            for (end, column) in [
                (&key.foreign_table, &reference.foreign_column),
                (&key.primary_table, &reference.primary_column),
            ] {
                if self.table(end).and_then(|t| t.column(column)).is_none() {
                    return Err(violation(format!(
                        "foreign key {} references missing column {}.{}",
                        key.name, end, column
                    )));
                }
            }
        }
        Ok(())
    }
}

fn violation(message: String) -> CrawlError {
    CrawlError::CatalogInvariant(message)
}

fn unique<'a>(names: impl Iterator<Item = &'a str>, what: &str) -> CrawlResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(violation(format!("duplicate {what}: {name}")));
        }
    }
    Ok(())
}
