//! Plain-text rendering.
//!
//! Layout is fixed-width and line-oriented. Warnings are not part of the
//! text body; callers print them separately.

use std::fmt::{self, Write};

use crate::command::{
    ColumnReport, QueryOutput, RenderableResult, Report, ResultBody, RoutineReport,
    SchemaReport, SequenceReport, SynonymReport, TableReport,
};
use crate::connection::QueryResult;

const INDENT: &str = "  ";

pub(super) fn render(result: &RenderableResult) -> Result<String, fmt::Error> {
    let mut out = String::new();
    heading(&mut out, &result.title, '=')?;
    match &result.body {
        ResultBody::Report(report) => write_report(&mut out, report)?,
        ResultBody::Query(outputs) => write_queries(&mut out, outputs)?,
    }
    Ok(out)
}

fn heading(out: &mut String, text: &str, underline: char) -> fmt::Result {
    writeln!(out, "{text}")?;
    writeln!(out, "{}", underline.to_string().repeat(text.chars().count().max(1)))
}

// ============================================================================
// Reports
// ============================================================================

fn write_report(out: &mut String, report: &Report) -> fmt::Result {
    if let Some(db) = &report.database {
        writeln!(out)?;
        writeln!(out, "Database: {} {}", db.product_name, db.product_version)?;
        writeln!(out, "Driver:   {}", db.driver)?;
    }

    for schema in &report.schemas {
        write_schema(out, schema)?;
    }
    Ok(())
}

fn write_schema(out: &mut String, schema: &SchemaReport) -> fmt::Result {
    if let Some(name) = &schema.name {
        writeln!(out)?;
        heading(out, &format!("Schema {name}"), '-')?;
    }

    for table in &schema.tables {
        write_table(out, table)?;
    }
    for routine in &schema.routines {
        write_routine(out, routine)?;
    }
    for sequence in &schema.sequences {
        write_sequence(out, sequence)?;
    }
    for synonym in &schema.synonyms {
        write_synonym(out, synonym)?;
    }
    Ok(())
}

fn write_table(out: &mut String, table: &TableReport) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "{} [{}]", table.name, table.kind)?;

    write_columns(out, &table.columns)?;

    if let Some(pk) = &table.primary_key {
        writeln!(out, "{INDENT}primary key ({})", pk.join(", "))?;
    }
    for key in &table.foreign_keys {
        let (from, to): (Vec<&str>, Vec<&str>) = key
            .columns
            .iter()
            .map(|(f, p)| (f.as_str(), p.as_str()))
            .unzip();
        writeln!(
            out,
            "{INDENT}foreign key {} ({}) references {} ({}) on update {} on delete {}",
            key.name,
            from.join(", "),
            key.primary_table,
            to.join(", "),
            key.update_rule,
            key.delete_rule
        )?;
    }
    for index in &table.indexes {
        let kind = if index.unique { "unique index" } else { "index" };
        writeln!(out, "{INDENT}{kind} {} ({})", index.name, index.columns.join(", "))?;
    }
    if let Some(remarks) = &table.remarks {
        writeln!(out, "{INDENT}remarks: {remarks}")?;
    }
    if let Some(definition) = &table.definition {
        writeln!(out, "{INDENT}definition:")?;
        for line in definition.lines() {
            writeln!(out, "{INDENT}{INDENT}{line}")?;
        }
    }
    Ok(())
}

fn write_columns(out: &mut String, columns: &[ColumnReport]) -> fmt::Result {
    let name_width = columns.iter().map(|c| c.name.chars().count()).max().unwrap_or(0);
    let type_width = columns.iter().map(|c| c.type_name.chars().count()).max().unwrap_or(0);

    for column in columns {
        let mut line = format!(
            "{INDENT}{:name_width$}  {:type_width$}",
            column.name, column.type_name
        );
        if let Some(nullable) = column.nullable {
            line.push_str(if nullable { "  null" } else { "  not null" });
        }
        if let Some(default) = &column.default_value {
            line.push_str(&format!("  default {default}"));
        }
        if let Some(remarks) = &column.remarks {
            line.push_str(&format!("  -- {remarks}"));
        }
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}

fn write_routine(out: &mut String, routine: &RoutineReport) -> fmt::Result {
    writeln!(out)?;
    write!(out, "{} [{}]", routine.name, routine.kind)?;
    if let Some(return_type) = &routine.return_type {
        write!(out, " returns {return_type}")?;
    }
    writeln!(out)?;

    let name_width = routine
        .parameters
        .iter()
        .map(|p| p.name.chars().count())
        .max()
        .unwrap_or(0);
    for param in &routine.parameters {
        writeln!(
            out,
            "{INDENT}{:name_width$}  {:6}  {}",
            param.name, param.mode, param.type_name
        )?;
    }
    if let Some(remarks) = &routine.remarks {
        writeln!(out, "{INDENT}remarks: {remarks}")?;
    }
    if let Some(definition) = &routine.definition {
        writeln!(out, "{INDENT}definition:")?;
        for line in definition.lines() {
            writeln!(out, "{INDENT}{INDENT}{line}")?;
        }
    }
    Ok(())
}

fn write_sequence(out: &mut String, sequence: &SequenceReport) -> fmt::Result {
    writeln!(out)?;
    writeln!(out, "{} [sequence]", sequence.name)?;
    if let Some(attrs) = &sequence.attributes {
        let values = [
            ("start", attrs.start),
            ("increment", attrs.increment),
            ("minimum", attrs.minimum),
            ("maximum", attrs.maximum),
        ];
        for (label, value) in values {
            if let Some(value) = value {
                writeln!(out, "{INDENT}{label:9}  {value}")?;
            }
        }
        writeln!(out, "{INDENT}{:9}  {}", "cycle", attrs.cycle)?;
    }
    Ok(())
}

fn write_synonym(out: &mut String, synonym: &SynonymReport) -> fmt::Result {
    writeln!(out)?;
    match &synonym.referenced_object {
        Some(target) => writeln!(out, "{} [synonym] for {target}", synonym.name),
        None => writeln!(out, "{} [synonym]", synonym.name),
    }
}

// ============================================================================
// Queries
// ============================================================================

fn write_queries(out: &mut String, outputs: &[QueryOutput]) -> fmt::Result {
    for output in outputs {
        writeln!(out)?;
        if let Some(table) = &output.table {
            writeln!(out, "-- {table}")?;
        }
        writeln!(out, "{}", output.sql)?;
        write_grid(out, &output.result)?;
    }
    Ok(())
}

/// Rows as a left-aligned grid, one column per result column.
fn write_grid(out: &mut String, result: &QueryResult) -> fmt::Result {
    let cells: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect();

    let mut widths: Vec<usize> = result.columns.iter().map(|c| c.chars().count()).collect();
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            match widths.get_mut(i) {
                Some(width) => *width = (*width).max(len),
                None => widths.push(len),
            }
        }
    }

    write_row(out, &result.columns, &widths)?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    write_row(out, &rule, &widths)?;
    for row in &cells {
        write_row(out, row, &widths)?;
    }
    Ok(())
}

fn write_row(out: &mut String, cells: &[String], widths: &[usize]) -> fmt::Result {
    let line = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{cell:width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(out, "{}", line.trim_end())
}
