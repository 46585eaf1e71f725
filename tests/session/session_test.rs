//! End-to-end runs against a SQLite file.

use std::path::PathBuf;

use schemascope::config::{keys, Config, ConfigError, ConnectionConfig};
use schemascope::session::{run, RunError, RunRequest, Stage};

/// A library database on disk, removed on drop.
struct LibraryFile {
    path: PathBuf,
}

impl LibraryFile {
    fn create(name: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "schemascope-{}-{}.db",
            std::process::id(),
            name
        ));
        let _ = std::fs::remove_file(&path);

        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "
            CREATE TABLE Authors (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
            CREATE TABLE Books (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                author_id INTEGER REFERENCES Authors
            );
            INSERT INTO Authors VALUES (1, 'Frank Herbert');
            INSERT INTO Books VALUES (1, 'Dune', 1);
            ",
        )
        .unwrap();
        Self { path }
    }

    fn url(&self) -> String {
        format!("sqlite:{}", self.path.display())
    }

    fn config(&self) -> Config {
        Config::defaults()
            .with(keys::URL, self.url())
            .with(keys::NO_INFO, "true")
    }
}

impl Drop for LibraryFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[tokio::test]
async fn test_list_report() {
    let db = LibraryFile::create("list");
    let outcome = run(RunRequest::new(db.config(), "list")).await.unwrap();

    assert_eq!(outcome.stage, Stage::Rendered);
    assert!(outcome.catalog.is_some());
    insta::assert_snapshot!(outcome.output, @r"
    list
    ====

    Schema main
    -----------

    Authors [table]

    Books [table]
    ");
}

#[tokio::test]
async fn test_schema_report_text() {
    let db = LibraryFile::create("schema");
    let outcome = run(RunRequest::new(db.config(), "schema")).await.unwrap();

    assert!(outcome.output.contains("  title      TEXT     not null\n"));
    assert!(outcome.output.contains("  primary key (id)\n"));
    assert!(outcome.output.contains(
        "  foreign key FK_Books_0 (author_id) references main.Authors (id) on update no action on delete no action\n"
    ));
}

#[tokio::test]
async fn test_json_output() {
    let db = LibraryFile::create("json");
    let config = db
        .config()
        .with(keys::OUTPUT_FORMAT, "json")
        .with(keys::NO_INFO, "false");
    let outcome = run(RunRequest::new(config, "brief")).await.unwrap();

    let json: serde_json::Value = serde_json::from_str(&outcome.output).unwrap();
    assert_eq!(json["title"], "brief");
    assert_eq!(json["body"]["type"], "report");
    assert_eq!(json["body"]["content"]["database"]["product_name"], "SQLite");
    let tables = &json["body"]["content"]["schemas"][0]["tables"];
    assert_eq!(tables[1]["name"], "main.Books");
    assert_eq!(tables[1]["columns"][1]["name"], "title");
}

#[tokio::test]
async fn test_query_without_catalog() {
    let db = LibraryFile::create("query");
    let config = db.config().with("titles", "SELECT title FROM Books");
    let outcome = run(RunRequest::new(config, "titles")).await.unwrap();

    assert!(outcome.catalog.is_none());
    assert_eq!(outcome.stage, Stage::Rendered);
    assert_eq!(
        outcome.output,
        "titles\n======\n\nSELECT title FROM Books\ntitle\n-----\nDune\n"
    );
}

#[tokio::test]
async fn test_dump_with_table_filter() {
    let db = LibraryFile::create("dump");
    let config = db
        .config()
        .with("schemacrawler.table.pattern.include", ".*\\.Authors");
    let outcome = run(RunRequest::new(config, "dump")).await.unwrap();

    assert!(outcome
        .output
        .contains("SELECT id, name FROM main.Authors ORDER BY id, name\n"));
    assert!(!outcome.output.contains("Books"));
}

#[tokio::test]
async fn test_connection_override() {
    let db = LibraryFile::create("override");
    let config = Config::defaults().with(keys::URL, "sqlite:/nonexistent/dir/nothing.db");
    let request = RunRequest::new(config, "list").with_connection(ConnectionConfig::new(db.url()));

    let outcome = run(request).await.unwrap();
    assert!(outcome.output.contains("Books [table]"));
}

#[tokio::test]
async fn test_missing_database_fails_after_validation() {
    let config = Config::defaults().with(keys::URL, "sqlite:/nonexistent/dir/nothing.db");

    let err = run(RunRequest::new(config.clone(), "list")).await.unwrap_err();
    assert!(matches!(err.error, RunError::Connection(_)));
    assert_eq!(err.stage, Stage::Idle);

    // Configuration problems win over the unreachable database.
    let bad = config.with("schemacrawler.table.pattern.include", "[");
    let err = run(RunRequest::new(bad, "list")).await.unwrap_err();
    assert!(matches!(
        err.error,
        RunError::Crawl(schemascope::CrawlError::Config(ConfigError::InvalidPattern { .. }))
    ));
}
