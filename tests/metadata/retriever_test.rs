//! Retrieval planning, failure tolerance and the crawl deadline.

use std::time::Duration;

use schemascope::catalog::SchemaRef;
use schemascope::config::{Config, CrawlOptions, InfoLevel};
use schemascope::crawl_with;
use schemascope::filter::{Category, InclusionRule};
use schemascope::metadata::{
    ColumnRecord, DatabaseInfo, InMemoryProvider, MetadataError, MetadataKind, RecordSet,
    Retriever, RoutineRecord, SchemaRecord, SequenceRecord, TableRecord, UNKNOWN_TYPE,
};
use schemascope::{CrawlError, WarningKind};

fn records() -> RecordSet {
    let schema = SchemaRef::named("BOOKS");
    let books = schema.table("Books");
    let mut untyped = ColumnRecord::new(books.clone(), " title ", 0, "");
    untyped.ordinal = None;
    untyped.type_name = None;

    RecordSet {
        database: DatabaseInfo {
            product_name: "TestDB".to_string(),
            product_version: "1.0".to_string(),
            driver: "memory".to_string(),
        },
        schemas: vec![SchemaRecord {
            schema: schema.clone(),
        }],
        tables: vec![TableRecord::new(books.clone(), " base table ")],
        columns: vec![ColumnRecord::new(books, "id", 1, "INTEGER"), untyped],
        routines: vec![RoutineRecord::new(schema.clone(), "NEW_BOOK", "procedure")],
        sequences: vec![SequenceRecord {
            schema,
            name: "BOOK_SEQ".to_string(),
            start: Some(1),
            increment: Some(1),
            minimum: None,
            maximum: None,
            cycle: false,
        }],
        ..Default::default()
    }
}

fn options(level: InfoLevel) -> CrawlOptions {
    CrawlOptions {
        info_level: level,
        ..CrawlOptions::default()
    }
}

// ============================================================================
// Planning
// ============================================================================

#[test]
fn test_minimum_level_plan() {
    let provider = InMemoryProvider::new(records());
    let options = options(InfoLevel::Minimum);
    let planned = Retriever::new(&provider, &options).planned_kinds();

    assert_eq!(
        planned,
        [MetadataKind::Schemas, MetadataKind::Tables, MetadataKind::Routines]
    );
}

#[test]
fn test_sequences_need_level_and_pattern() {
    let provider = InMemoryProvider::new(records());

    // Detailed level, but the default sequence pattern is empty.
    let detailed = options(InfoLevel::Detailed);
    let planned = Retriever::new(&provider, &detailed).planned_kinds();
    assert!(!planned.contains(&MetadataKind::Sequences));

    let mut with_pattern = options(InfoLevel::Detailed);
    with_pattern.rules = with_pattern
        .rules
        .with_rule(Category::Sequence, InclusionRule::include_all());
    let planned = Retriever::new(&provider, &with_pattern).planned_kinds();
    assert!(planned.contains(&MetadataKind::Sequences));
}

#[test]
fn test_empty_table_pattern_skips_table_children() {
    let provider = InMemoryProvider::new(records());
    let mut options = options(InfoLevel::Standard);
    options.rules = options
        .rules
        .with_rule(Category::Table, InclusionRule::exclude_all());
    let planned = Retriever::new(&provider, &options).planned_kinds();

    for kind in [
        MetadataKind::Tables,
        MetadataKind::Columns,
        MetadataKind::Indexes,
        MetadataKind::ForeignKeys,
    ] {
        assert!(!planned.contains(&kind), "{kind} planned");
    }
    assert!(planned.contains(&MetadataKind::Routines));
    assert!(planned.contains(&MetadataKind::Parameters));
}

// ============================================================================
// Retrieval
// ============================================================================

#[tokio::test]
async fn test_records_are_normalized() {
    let provider = InMemoryProvider::new(records());
    let options = options(InfoLevel::Standard);
    let retrieved = Retriever::new(&provider, &options).retrieve().await.unwrap();

    assert_eq!(retrieved.database.product_name, "TestDB");
    assert_eq!(retrieved.tables[0].kind, "BASE TABLE");
    assert_eq!(retrieved.routines[0].kind, "PROCEDURE");
    assert_eq!(
        retrieved.routines[0].specific_name.as_deref(),
        Some("NEW_BOOK")
    );

    let title = retrieved.columns.iter().find(|c| c.name == "title").unwrap();
    assert_eq!(title.ordinal, Some(2));
    assert_eq!(title.type_name.as_deref(), Some(UNKNOWN_TYPE));
    assert_eq!(title.nullable, Some(true));
    assert!(retrieved.warnings.is_empty());
}

#[tokio::test]
async fn test_failed_category_is_omitted() {
    let provider = InMemoryProvider::new(records()).failing(
        MetadataKind::Routines,
        MetadataError::PermissionDenied("SYS.PROCEDURES".to_string()),
    );
    let options = options(InfoLevel::Standard);
    let retrieved = Retriever::new(&provider, &options).retrieve().await.unwrap();

    assert!(retrieved.routines.is_empty());
    assert!(retrieved.omitted.contains(&MetadataKind::Routines));
    assert_eq!(retrieved.tables.len(), 1);
    assert_eq!(retrieved.warnings.len(), 1);
    assert_eq!(retrieved.warnings[0].kind, WarningKind::CategoryUnavailable);
}

#[tokio::test]
async fn test_connection_failure_is_fatal() {
    let provider = InMemoryProvider::new(records()).failing(
        MetadataKind::Columns,
        MetadataError::Connection("connection reset".to_string()),
    );
    let options = options(InfoLevel::Standard);
    let err = Retriever::new(&provider, &options)
        .retrieve()
        .await
        .unwrap_err();
    assert!(matches!(err, CrawlError::Metadata(MetadataError::Connection(_))));

    let provider = InMemoryProvider::new(records())
        .failing_database_info(MetadataError::Connection("refused".to_string()));
    let err = Retriever::new(&provider, &options)
        .retrieve()
        .await
        .unwrap_err();
    assert!(matches!(err, CrawlError::Metadata(_)));
}

#[tokio::test]
async fn test_deadline_yields_partial_records() {
    let provider = InMemoryProvider::new(records())
        .delayed(MetadataKind::Columns, Duration::from_secs(5));
    let mut options = options(InfoLevel::Standard);
    options.timeout = Duration::from_millis(200);

    let retrieved = Retriever::new(&provider, &options).retrieve().await.unwrap();

    assert!(retrieved.columns.is_empty());
    assert_eq!(
        retrieved.omitted.iter().copied().collect::<Vec<_>>(),
        [MetadataKind::Columns]
    );
    assert_eq!(retrieved.warnings.len(), 1);
    assert_eq!(retrieved.warnings[0].kind, WarningKind::Timeout);
    assert_eq!(retrieved.tables.len(), 1);
    assert_eq!(retrieved.routines.len(), 1);
}

#[tokio::test]
async fn test_single_worker_still_completes() {
    let provider = InMemoryProvider::new(records());
    let mut options = options(InfoLevel::Maximum);
    options.max_workers = 1;

    let retrieved = Retriever::new(&provider, &options).retrieve().await.unwrap();
    assert_eq!(retrieved.tables.len(), 1);
    assert_eq!(retrieved.columns.len(), 2);
}

// ============================================================================
// Whole crawl
// ============================================================================

#[tokio::test]
async fn test_crawl_with_partial_metadata() {
    let provider = InMemoryProvider::new(records())
        .failing(MetadataKind::Indexes, MetadataError::QueryFailed("boom".to_string()));
    let config = Config::defaults().with(
        "schemacrawler.sequence.pattern.include",
        ".*",
    );
    let options = CrawlOptions::from_config(&config.with("infolevel", "detailed")).unwrap();

    let catalog = crawl_with(&provider, &options).await.unwrap();

    assert_eq!(catalog.tables().count(), 1);
    assert_eq!(catalog.sequences().count(), 1);
    assert!(catalog.omitted.contains(&MetadataKind::Indexes));
    assert!(catalog
        .warnings
        .iter()
        .any(|w| w.kind == WarningKind::CategoryUnavailable));
}
