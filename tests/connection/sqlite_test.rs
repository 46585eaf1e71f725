//! Crawling a live SQLite database.

use schemascope::catalog::{IndexKind, SchemaRef, TableKind};
use schemascope::command::{Command, ResultBody};
use schemascope::config::{Config, ConnectionConfig, ConnectionError};
use schemascope::connection::{self, CellValue, Connection, SqliteConnection};
use schemascope::metadata::MetadataKind;
use schemascope::{crawl, WarningKind};

fn library() -> SqliteConnection {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "
        CREATE TABLE Publishers (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
        CREATE TABLE Authors (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
        CREATE TABLE Books (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            publisher_id INTEGER REFERENCES Publishers ON DELETE CASCADE,
            price REAL DEFAULT 0
        );
        CREATE TABLE BookAuthors (
            book_id INTEGER NOT NULL REFERENCES Books (id),
            author_id INTEGER NOT NULL REFERENCES Authors (id),
            PRIMARY KEY (book_id, author_id)
        );
        CREATE INDEX idx_books_title ON Books (title);
        CREATE VIEW BookTitles AS SELECT title FROM Books;

        INSERT INTO Publishers VALUES (1, 'Chilton');
        INSERT INTO Books VALUES (2, 'Dune Messiah', 1, 9.5);
        INSERT INTO Books VALUES (1, 'Dune', 1, 12.0);
        ",
    )
    .unwrap();
    SqliteConnection::from_connection(conn)
}

fn main_table(name: &str) -> schemascope::catalog::TableRef {
    SchemaRef::named("main").table(name)
}

#[tokio::test]
async fn test_crawl_library() {
    let db = library();
    let catalog = crawl(&db, &Config::defaults()).await.unwrap();

    assert_eq!(catalog.database.product_name, "SQLite");
    assert_eq!(catalog.schemas.len(), 1);
    assert_eq!(catalog.schemas[0].id, SchemaRef::named("main"));

    let names: Vec<&str> = catalog.tables().map(|t| t.id.name.as_str()).collect();
    assert_eq!(
        names,
        ["Authors", "BookAuthors", "Books", "BookTitles", "Publishers"]
    );

    let view = catalog.table(&main_table("BookTitles")).unwrap();
    assert_eq!(view.kind, TableKind::View);

    let books = catalog.table(&main_table("Books")).unwrap();
    let title = books.column("title").unwrap();
    assert!(!title.nullable);
    let price = books.column("price").unwrap();
    assert_eq!(price.default_value.as_deref(), Some("0"));
    assert_eq!(books.primary_key.as_ref().unwrap().columns, ["id"]);
    assert_eq!(books.indexes.len(), 1);
    assert_eq!(books.indexes[0].kind, IndexKind::NonUnique);
}

#[tokio::test]
async fn test_foreign_keys_resolve_to_primary_keys() {
    let db = library();
    let catalog = crawl(&db, &Config::defaults()).await.unwrap();
    catalog.validate().unwrap();

    let books = catalog.table(&main_table("Books")).unwrap();
    let to_publisher = books.imported_keys().next().unwrap();
    assert_eq!(to_publisher.primary_table, main_table("Publishers"));
    assert_eq!(to_publisher.column_references[0].primary_column, "id");
    assert_eq!(to_publisher.delete_rule.as_str(), "cascade");

    let book_authors = catalog.table(&main_table("BookAuthors")).unwrap();
    assert_eq!(book_authors.imported_keys().count(), 2);
    assert_eq!(
        book_authors.primary_key.as_ref().unwrap().columns,
        ["book_id", "author_id"]
    );
}

#[tokio::test]
async fn test_foreign_key_spelled_in_other_case() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "
        CREATE TABLE Authors (id INTEGER PRIMARY KEY);
        CREATE TABLE Books (
            id INTEGER PRIMARY KEY,
            author_id INTEGER REFERENCES authors (ID)
        );
        ",
    )
    .unwrap();
    let db = SqliteConnection::from_connection(conn);
    let catalog = crawl(&db, &Config::defaults()).await.unwrap();
    catalog.validate().unwrap();

    let books = catalog.table(&main_table("Books")).unwrap();
    let key = books.imported_keys().next().unwrap();
    assert_eq!(key.primary_table, main_table("Authors"));
    assert_eq!(key.column_references[0].primary_column, "id");
    assert!(books.column("author_id").unwrap().part_of_foreign_key);
    assert!(catalog
        .warnings
        .iter()
        .all(|w| w.kind != WarningKind::UnresolvedReference));
}

#[tokio::test]
async fn test_unsupported_categories_become_warnings() {
    let db = library();
    let catalog = crawl(&db, &Config::defaults()).await.unwrap();

    assert!(catalog.omitted.contains(&MetadataKind::Routines));
    assert!(catalog.routines().next().is_none());
    assert!(catalog
        .warnings
        .iter()
        .all(|w| w.kind == WarningKind::CategoryUnavailable));
}

#[tokio::test]
async fn test_dependency_order_from_live_keys() {
    let db = library();
    let config = Config::defaults().with("schemacrawler.format.sort_alphabetically.tables", "false");
    let catalog = crawl(&db, &config).await.unwrap();

    let names: Vec<&str> = catalog.tables().map(|t| t.id.name.as_str()).collect();
    assert_eq!(
        names,
        ["Authors", "BookTitles", "Publishers", "Books", "BookAuthors"]
    );
}

#[tokio::test]
async fn test_count_and_dump() {
    let db = library();
    let config = Config::defaults().with("schemacrawler.table.pattern.include", "main\\.Books");
    let catalog = crawl(&db, &config).await.unwrap();

    let count = Command::resolve("count", &config).unwrap();
    let result = count
        .execute(Some(&catalog), Some(db.executor()), true)
        .await
        .unwrap();
    let ResultBody::Query(outputs) = &result.body else {
        panic!("expected query output");
    };
    assert_eq!(outputs.len(), 1);
    assert_eq!(outputs[0].sql, "SELECT COUNT(*) FROM main.Books");
    assert_eq!(outputs[0].result.rows, [[CellValue::Integer(2)]]);

    let dump = Command::resolve("dump", &config).unwrap();
    let result = dump
        .execute(Some(&catalog), Some(db.executor()), true)
        .await
        .unwrap();
    let ResultBody::Query(outputs) = &result.body else {
        panic!("expected query output");
    };
    assert_eq!(
        outputs[0].sql,
        "SELECT id, title, publisher_id, price FROM main.Books ORDER BY id, title, publisher_id, price"
    );
    assert_eq!(outputs[0].result.rows[0][1], CellValue::Text("Dune".to_string()));
}

#[tokio::test]
async fn test_failing_query_is_a_warning() {
    let db = library();
    let config = Config::defaults().with("broken", "SELECT * FROM NoSuchTable");
    let command = Command::resolve("broken", &config).unwrap();

    let result = command
        .execute(None, Some(db.executor()), true)
        .await
        .unwrap();
    let ResultBody::Query(outputs) = &result.body else {
        panic!("expected query output");
    };
    assert!(outputs.is_empty());
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(result.warnings[0].kind, WarningKind::QueryFailed);
}

#[test]
fn test_open_rejects_other_drivers() {
    let err = connection::open(&ConnectionConfig::new("jdbc:postgresql://localhost/books"))
        .err()
        .unwrap();
    assert!(matches!(err, ConnectionError::UnsupportedDriver(d) if d == "postgresql"));
}

#[tokio::test]
async fn test_open_memory_database() {
    let db = connection::open(&ConnectionConfig::new("sqlite::memory:")).unwrap();
    let catalog = crawl(db.as_ref(), &Config::defaults()).await.unwrap();
    assert_eq!(catalog.tables().count(), 0);
}
