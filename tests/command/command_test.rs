//! Command resolution, template expansion and dispatch.

use std::sync::Mutex;

use async_trait::async_trait;
use schemascope::catalog::{CatalogBuilder, SchemaRef, TableRef};
use schemascope::command::{
    dispatch, Command, DispatchError, QueryTemplate, ReportKind, ResultBody, DUMP_TEMPLATE,
};
use schemascope::config::{Config, ConfigError, ConnectionError, CrawlOptions};
use schemascope::connection::{CellValue, QueryExecutor, QueryResult};
use schemascope::metadata::{ColumnRecord, RecordSet, RoutineRecord, TableRecord};
use schemascope::{Catalog, WarningKind};

/// Records every statement; fails the ones mentioning `fail_on`.
#[derive(Default)]
struct RecordingExecutor {
    executed: Mutex<Vec<String>>,
    fail_on: Option<&'static str>,
}

impl RecordingExecutor {
    fn failing_on(marker: &'static str) -> Self {
        Self {
            fail_on: Some(marker),
            ..Default::default()
        }
    }

    fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueryExecutor for RecordingExecutor {
    async fn execute(&self, sql: &str) -> Result<QueryResult, ConnectionError> {
        self.executed.lock().unwrap().push(sql.to_string());
        if self.fail_on.is_some_and(|marker| sql.contains(marker)) {
            return Err(ConnectionError::QueryFailed(format!("no such table in {sql}")));
        }
        Ok(QueryResult {
            columns: vec!["n".to_string()],
            rows: vec![vec![CellValue::Integer(1)]],
        })
    }
}

fn catalog_with(records: RecordSet, config: &Config) -> Catalog {
    let options = CrawlOptions::from_config(config).unwrap();
    CatalogBuilder::new(&options).build(records)
}

/// `Books(id, title)` outside any schema.
fn books_catalog() -> Catalog {
    let books = TableRef::new(SchemaRef::default(), "Books");
    let records = RecordSet {
        tables: vec![TableRecord::new(books.clone(), "TABLE")],
        columns: vec![
            ColumnRecord::new(books.clone(), "title", 2, "VARCHAR(255)"),
            ColumnRecord::new(books, "id", 1, "INTEGER"),
        ],
        ..Default::default()
    };
    catalog_with(records, &Config::defaults())
}

fn library_catalog() -> Catalog {
    let schema = SchemaRef::named("BOOKS");
    let records = RecordSet {
        tables: vec![
            TableRecord::new(schema.table("Books"), "TABLE"),
            TableRecord::new(schema.table("Authors"), "TABLE"),
            TableRecord::new(schema.table("Order Items"), "TABLE"),
        ],
        columns: vec![
            ColumnRecord::new(schema.table("Books"), "id", 1, "INTEGER"),
            ColumnRecord::new(schema.table("Authors"), "id", 1, "INTEGER"),
            ColumnRecord::new(schema.table("Order Items"), "line no", 1, "INTEGER"),
        ],
        routines: vec![RoutineRecord::new(schema, "NEW_BOOK", "PROCEDURE")],
        ..Default::default()
    };
    catalog_with(records, &Config::defaults())
}

fn sql_of(result: &schemascope::RenderableResult) -> Vec<&str> {
    match &result.body {
        ResultBody::Query(outputs) => outputs.iter().map(|o| o.sql.as_str()).collect(),
        ResultBody::Report(_) => panic!("expected query output"),
    }
}

// ============================================================================
// Templates
// ============================================================================

#[test]
fn test_dump_template_on_books() {
    let catalog = books_catalog();
    let books = catalog.tables().next().unwrap();

    let sql = QueryTemplate::new(DUMP_TEMPLATE)
        .expand(Some(&catalog), Some(books))
        .unwrap();
    assert_eq!(sql, "SELECT id, title FROM Books ORDER BY id, title");
}

#[test]
fn test_template_variables() {
    let catalog = library_catalog();
    let items = catalog
        .tables()
        .find(|t| t.id.name == "Order Items")
        .unwrap();

    let sql = QueryTemplate::new("-- ${schema}.${tablename} (${tabletype})\nSELECT ${columns} FROM ${table}")
        .expand(Some(&catalog), Some(items))
        .unwrap();
    assert_eq!(
        sql,
        "-- BOOKS.Order Items (table)\nSELECT \"line no\" FROM BOOKS.\"Order Items\""
    );
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn test_named_query_runs_once_without_catalog() {
    let config = Config::defaults().with("query1", "SELECT * FROM BOOKS.Books");
    let executor = RecordingExecutor::default();

    let result = dispatch(None, "query1", &config, Some(&executor)).await.unwrap();

    assert_eq!(result.title, "query1");
    assert_eq!(executor.executed(), ["SELECT * FROM BOOKS.Books"]);
    assert_eq!(sql_of(&result), ["SELECT * FROM BOOKS.Books"]);
    assert!(result.warnings.is_empty());
}

#[tokio::test]
async fn test_count_runs_per_table_in_catalog_order() {
    let catalog = library_catalog();
    let executor = RecordingExecutor::default();

    let result = dispatch(Some(&catalog), "count", &Config::defaults(), Some(&executor))
        .await
        .unwrap();

    assert_eq!(
        executor.executed(),
        [
            "SELECT COUNT(*) FROM BOOKS.Authors",
            "SELECT COUNT(*) FROM BOOKS.Books",
            "SELECT COUNT(*) FROM BOOKS.\"Order Items\"",
        ]
    );
    let ResultBody::Query(outputs) = &result.body else {
        panic!("expected query output");
    };
    assert_eq!(outputs[0].table.as_deref(), Some("BOOKS.Authors"));
}

#[tokio::test]
async fn test_unknown_variable_skips_query() {
    let catalog = library_catalog();
    let config = Config::defaults().with("sizes", "SELECT ${rowcount} FROM ${table}");
    let executor = RecordingExecutor::default();

    let result = dispatch(Some(&catalog), "sizes", &config, Some(&executor))
        .await
        .unwrap();

    assert!(executor.executed().is_empty());
    assert!(sql_of(&result).is_empty());
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].kind, WarningKind::TemplateSubstitution);
    assert!(result.warnings[0].message.contains("rowcount"));
}

#[tokio::test]
async fn test_failed_query_skips_only_that_table() {
    let catalog = library_catalog();
    let executor = RecordingExecutor::failing_on("Authors");

    let result = dispatch(Some(&catalog), "count", &Config::defaults(), Some(&executor))
        .await
        .unwrap();

    assert_eq!(executor.executed().len(), 3);
    assert_eq!(sql_of(&result).len(), 2);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].kind, WarningKind::QueryFailed);
}

#[tokio::test]
async fn test_catalog_warnings_carry_over() {
    let mut catalog = library_catalog();
    catalog.warnings.push(schemascope::Warning::new(
        WarningKind::CategoryUnavailable,
        "routine parameters: not supported by this driver",
    ));

    let result = dispatch(Some(&catalog), "list", &Config::defaults(), None)
        .await
        .unwrap();
    assert_eq!(result.warnings, catalog.warnings);
}

#[tokio::test]
async fn test_missing_collaborators() {
    let config = Config::defaults();
    let executor = RecordingExecutor::default();

    let err = dispatch(None, "brief", &config, Some(&executor)).await.unwrap_err();
    assert!(matches!(err, DispatchError::MissingCatalog(_)));

    let err = dispatch(None, "SELECT 1", &config, None).await.unwrap_err();
    assert!(matches!(err, DispatchError::MissingConnection(_)));

    let err = dispatch(None, "frobnicate", &config, None).await.unwrap_err();
    assert!(matches!(err, DispatchError::Config(ConfigError::UnknownCommand(_))));
}

// ============================================================================
// Reports
// ============================================================================

#[tokio::test]
async fn test_report_levels() {
    let catalog = library_catalog();
    let config = Config::defaults();

    let list = dispatch(Some(&catalog), "list", &config, None).await.unwrap();
    let ResultBody::Report(list) = &list.body else {
        panic!("expected report");
    };
    assert_eq!(list.kind, ReportKind::List);
    assert!(list.schemas[0].tables.iter().all(|t| t.columns.is_empty()));
    assert_eq!(list.schemas[0].routines[0].name, "BOOKS.NEW_BOOK");

    let schema = dispatch(Some(&catalog), "schema", &config, None).await.unwrap();
    let ResultBody::Report(schema) = &schema.body else {
        panic!("expected report");
    };
    let books = schema.schemas[0]
        .tables
        .iter()
        .find(|t| t.name == "BOOKS.Books")
        .unwrap();
    assert_eq!(books.columns[0].nullable, Some(true));
}

#[tokio::test]
async fn test_portable_names_hide_qualifiers() {
    let config = Config::defaults().with("schemacrawler.format.portable_names", "true");
    let schema = SchemaRef::named("BOOKS");
    let records = RecordSet {
        tables: vec![TableRecord::new(schema.table("Books"), "TABLE")],
        ..Default::default()
    };
    let catalog = catalog_with(records, &config);

    let result = dispatch(Some(&catalog), "brief", &config, None).await.unwrap();
    let ResultBody::Report(report) = &result.body else {
        panic!("expected report");
    };
    assert!(report.database.is_none());
    assert_eq!(report.schemas[0].name, None);
    assert_eq!(report.schemas[0].tables[0].name, "Books");

    assert!(matches!(
        Command::resolve("brief", &config).unwrap(),
        Command::Report(ReportKind::Brief)
    ));
}
