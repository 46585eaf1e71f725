//! Configured ordering of tables, columns, routines and parameters.

use schemascope::catalog::{dependency_order, CatalogBuilder, SchemaRef, TableRef};
use schemascope::config::{Config, CrawlOptions};
use schemascope::metadata::{
    ColumnRecord, ForeignKeyRecord, ParameterRecord, RecordSet, RoutineRecord, TableRecord,
};
use schemascope::{Catalog, WarningKind};

fn table(name: &str) -> TableRef {
    SchemaRef::named("BOOKS").table(name)
}

fn library() -> RecordSet {
    let authors = table("Authors");
    let books = table("Books");
    let book_authors = table("BookAuthors");
    let publishers = table("Publishers");

    RecordSet {
        tables: [&publishers, &books, &book_authors, &authors]
            .into_iter()
            .map(|t| TableRecord::new(t.clone(), "TABLE"))
            .collect(),
        columns: vec![
            ColumnRecord::new(books.clone(), "id", 1, "INTEGER"),
            ColumnRecord::new(books.clone(), "title", 2, "VARCHAR(255)"),
            ColumnRecord::new(books.clone(), "publisher_id", 3, "INTEGER"),
            ColumnRecord::new(book_authors.clone(), "book_id", 1, "INTEGER"),
            ColumnRecord::new(book_authors.clone(), "author_id", 2, "INTEGER"),
            ColumnRecord::new(authors.clone(), "id", 1, "INTEGER"),
            ColumnRecord::new(publishers.clone(), "id", 1, "INTEGER"),
        ],
        foreign_keys: vec![
            ForeignKeyRecord::new("FK_BA_BOOK", (&book_authors, "book_id"), (&books, "id"), 1),
            ForeignKeyRecord::new(
                "FK_BA_AUTHOR",
                (&book_authors, "author_id"),
                (&authors, "id"),
                1,
            ),
            ForeignKeyRecord::new(
                "FK_BOOK_PUBLISHER",
                (&books, "publisher_id"),
                (&publishers, "id"),
                1,
            ),
        ],
        ..Default::default()
    }
}

fn build_with(config: Config, records: RecordSet) -> Catalog {
    let options = CrawlOptions::from_config(&Config::layered([Config::defaults(), config])).unwrap();
    CatalogBuilder::new(&options).build(records)
}

fn table_names(catalog: &Catalog) -> Vec<&str> {
    catalog.tables().map(|t| t.id.name.as_str()).collect()
}

#[test]
fn test_tables_alphabetical() {
    let catalog = build_with(
        Config::new().with("schemacrawler.format.sort_alphabetically.tables", "true"),
        library(),
    );
    assert_eq!(
        table_names(&catalog),
        ["Authors", "BookAuthors", "Books", "Publishers"]
    );
}

#[test]
fn test_tables_in_dependency_order() {
    let catalog = build_with(
        Config::new().with("schemacrawler.format.sort_alphabetically.tables", "false"),
        library(),
    );
    assert_eq!(
        table_names(&catalog),
        ["Authors", "Publishers", "Books", "BookAuthors"]
    );
    assert!(catalog.warnings.is_empty());
}

#[test]
fn test_dependency_cycle_is_broken_and_reported() {
    let a = table("A");
    let b = table("B");
    let records = RecordSet {
        tables: vec![
            TableRecord::new(b.clone(), "TABLE"),
            TableRecord::new(a.clone(), "TABLE"),
        ],
        columns: vec![
            ColumnRecord::new(a.clone(), "b_id", 1, "INTEGER"),
            ColumnRecord::new(b.clone(), "a_id", 1, "INTEGER"),
        ],
        foreign_keys: vec![
            ForeignKeyRecord::new("FK_A_B", (&a, "b_id"), (&b, "a_id"), 1),
            ForeignKeyRecord::new("FK_B_A", (&b, "a_id"), (&a, "b_id"), 1),
        ],
        ..Default::default()
    };

    let catalog = build_with(
        Config::new().with("schemacrawler.format.sort_alphabetically.tables", "no"),
        records,
    );
    assert_eq!(table_names(&catalog), ["A", "B"]);
    assert_eq!(catalog.warnings.len(), 1);
    assert_eq!(catalog.warnings[0].kind, WarningKind::DependencyCycle);
}

#[test]
fn test_self_reference_is_not_a_cycle() {
    let employees = table("Employees");
    let order = dependency_order(
        std::slice::from_ref(&employees),
        [(&employees, &employees)],
    );
    assert_eq!(order.order, [employees]);
    assert!(order.cycles.is_empty());
}

#[test]
fn test_columns_by_ordinal_or_name() {
    let by_ordinal = build_with(Config::new(), library());
    let books = by_ordinal.table(&table("Books")).unwrap();
    let names: Vec<&str> = books.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "title", "publisher_id"]);

    let by_name = build_with(
        Config::new().with("schemacrawler.format.sort_alphabetically.table_columns", "true"),
        library(),
    );
    let books = by_name.table(&table("Books")).unwrap();
    let names: Vec<&str> = books.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "publisher_id", "title"]);
}

#[test]
fn test_routines_and_parameters() {
    let schema = SchemaRef::named("BOOKS");
    let mut zeta = RoutineRecord::new(schema.clone(), "zeta", "FUNCTION");
    zeta.specific_name = Some("R1".to_string());
    let mut alpha = RoutineRecord::new(schema.clone(), "Alpha", "PROCEDURE");
    alpha.specific_name = Some("R3".to_string());
    let mut beta = RoutineRecord::new(schema.clone(), "beta", "PROCEDURE");
    beta.specific_name = Some("R2".to_string());

    let mut second = ParameterRecord::new(schema.clone(), "Alpha", Some("A_FIRST"), 2, "IN", "INT");
    second.specific_name = Some("R3".to_string());
    let mut first = ParameterRecord::new(schema, "Alpha", Some("Z_LAST"), 1, "OUT", "INT");
    first.specific_name = Some("R3".to_string());

    let records = RecordSet {
        routines: vec![zeta, alpha, beta],
        parameters: vec![second, first],
        ..Default::default()
    };

    let by_name = build_with(Config::new(), records.clone());
    let names: Vec<&str> = by_name.routines().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["Alpha", "beta", "zeta"]);
    let alpha = by_name.routines().find(|r| r.name == "Alpha").unwrap();
    let params: Vec<&str> = alpha.parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(params, ["Z_LAST", "A_FIRST"]);

    let natural = build_with(
        Config::new()
            .with("schemacrawler.format.sort_alphabetically.routines", "false")
            .with("schemacrawler.format.sort_alphabetically.routine_columns", "true"),
        records,
    );
    let names: Vec<&str> = natural.routines().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["zeta", "beta", "Alpha"]);
    let alpha = natural.routines().find(|r| r.name == "Alpha").unwrap();
    let params: Vec<&str> = alpha.parameters.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(params, ["A_FIRST", "Z_LAST"]);
}
