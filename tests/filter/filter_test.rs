//! Inclusion rules and record pruning.

use schemascope::catalog::SchemaRef;
use schemascope::config::{Config, ConfigError};
use schemascope::filter::{self, included, Category, InclusionRule, RuleSet};
use schemascope::metadata::{
    ColumnRecord, ParameterRecord, RecordSet, RoutineRecord, TableRecord,
};
use schemascope::WarningKind;

fn library() -> RecordSet {
    let schema = SchemaRef::named("LIBRARY");
    let authors = schema.table("Authors");
    let books = schema.table("Books");
    RecordSet {
        tables: vec![
            TableRecord::new(authors.clone(), "TABLE"),
            TableRecord::new(books.clone(), "TABLE"),
        ],
        columns: vec![
            ColumnRecord::new(authors.clone(), "id", 1, "INTEGER"),
            ColumnRecord::new(authors, "name", 2, "TEXT"),
            ColumnRecord::new(books.clone(), "id", 1, "INTEGER"),
            ColumnRecord::new(books, "title", 2, "TEXT"),
        ],
        routines: vec![
            RoutineRecord::new(schema.clone(), "NEW_BOOK", "PROCEDURE"),
            RoutineRecord::new(schema.clone(), "BOOK_COUNT", "FUNCTION"),
        ],
        parameters: vec![ParameterRecord::new(
            schema,
            "NEW_BOOK",
            Some("TITLE"),
            1,
            "IN",
            "VARCHAR",
        )],
        ..Default::default()
    }
}

fn table_names(records: &RecordSet) -> Vec<&str> {
    records.tables.iter().map(|t| t.table.name.as_str()).collect()
}

// ============================================================================
// Rules
// ============================================================================

#[test]
fn test_exclude_overrides_include() {
    let rules = RuleSet::default().with_rule(
        Category::Table,
        InclusionRule::new(".*", ".*A.*").unwrap(),
    );

    assert!(!included("Authors", Category::Table, &rules));
    assert!(included("Books", Category::Table, &rules));
}

#[test]
fn test_precedence_for_any_identifier() {
    let rule = InclusionRule::new(".*", "B.*").unwrap();
    for identifier in ["B", "Books", "BOOKS.Books", "Bx y"] {
        assert!(!rule.test(identifier), "{identifier} matched both");
    }
    assert!(rule.test("Authors"));
}

#[test]
fn test_patterns_match_whole_identifier() {
    let rule = InclusionRule::new("Book", "").unwrap();
    assert!(rule.test("Book"));
    assert!(!rule.test("Books"));
    assert!(!rule.test("MyBook"));
}

#[test]
fn test_rules_from_config() {
    let config = Config::defaults()
        .with("schemacrawler.table.pattern.include", "LIBRARY\\..*")
        .with("schemacrawler.table.pattern.exclude", ".*\\.Authors");
    let rules = RuleSet::from_config(&config).unwrap();

    assert!(rules.included(Category::Table, "LIBRARY.Books"));
    assert!(!rules.included(Category::Table, "LIBRARY.Authors"));
    assert!(!rules.included(Category::Table, "OTHER.Books"));

    // Sequences and synonyms are off unless asked for.
    assert!(rules.rule(Category::Sequence).excludes_all());
    assert!(rules.rule(Category::Synonym).excludes_all());
}

#[test]
fn test_malformed_pattern_names_its_key() {
    let config = Config::defaults().with("schemacrawler.routine.pattern.exclude", "(unclosed");
    let err = RuleSet::from_config(&config).unwrap_err();

    assert!(matches!(
        err,
        ConfigError::InvalidPattern { ref key, .. } if key == "schemacrawler.routine.pattern.exclude"
    ));
}

#[test]
fn test_overlapping_rules_warn() {
    let config = Config::defaults()
        .with("schemacrawler.schema.pattern.include", "LIBRARY")
        .with("schemacrawler.table.pattern.exclude", ".*_OLD");
    let warnings = RuleSet::from_config(&config).unwrap().validate();

    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].kind, WarningKind::PatternOverlap);

    assert!(RuleSet::default().validate().is_empty());
}

// ============================================================================
// Record pruning
// ============================================================================

#[test]
fn test_authors_excluded() {
    let rules = RuleSet::default().with_rule(
        Category::Table,
        InclusionRule::new(".*", ".*A.*").unwrap(),
    );
    let filtered = filter::apply(library(), &rules);

    assert_eq!(table_names(&filtered), ["Books"]);
    assert!(filtered.columns.iter().all(|c| c.table.name == "Books"));
}

#[test]
fn test_no_tables_all_routines() {
    let config = Config::defaults()
        .with("schemacrawler.table.pattern.include", "")
        .with("schemacrawler.routine.pattern.include", ".*");
    let rules = RuleSet::from_config(&config).unwrap();
    let filtered = filter::apply(library(), &rules);

    assert!(filtered.tables.is_empty());
    assert!(filtered.columns.is_empty());
    assert_eq!(filtered.routines.len(), 2);
    assert_eq!(filtered.parameters.len(), 1);
    // An empty include is deliberate, not an empty match.
    assert!(filtered.warnings.is_empty());
}

#[test]
fn test_parameters_follow_routine() {
    let rules = RuleSet::default().with_rule(
        Category::Routine,
        InclusionRule::new(".*COUNT", "").unwrap(),
    );
    let filtered = filter::apply(library(), &rules);

    assert_eq!(filtered.routines.len(), 1);
    assert_eq!(filtered.routines[0].name, "BOOK_COUNT");
    assert!(filtered.parameters.is_empty());
}

#[test]
fn test_filtering_is_idempotent() {
    let rules = RuleSet::default()
        .with_rule(Category::Table, InclusionRule::new(".*", ".*A.*").unwrap())
        .with_rule(Category::Column, InclusionRule::new(".*", ".*\\.title").unwrap());

    let once = filter::apply(library(), &rules);
    let twice = filter::apply(once.clone(), &rules);

    assert_eq!(once.tables, twice.tables);
    assert_eq!(once.columns, twice.columns);
    assert_eq!(once.routines, twice.routines);
    assert_eq!(once.parameters, twice.parameters);
}
