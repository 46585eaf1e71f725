//! Configuration keys understood by the crawler.
//!
//! Keys are plain strings for compatibility with existing config files.
//! Inside the crate, pattern keys are derived from
//! [`Category`](crate::filter::Category) rather than spelled out.

pub const URL: &str = "url";
pub const USER: &str = "user";
pub const PASSWORD: &str = "password";

pub const INFO_LEVEL: &str = "infolevel";
pub const OUTPUT_FORMAT: &str = "outputformat";
pub const NO_INFO: &str = "noinfo";

pub const SHOW_UNQUALIFIED_NAMES: &str = "schemacrawler.format.show_unqualified_names";
pub const PORTABLE_NAMES: &str = "schemacrawler.format.portable_names";

pub const SORT_TABLES: &str = "schemacrawler.format.sort_alphabetically.tables";
pub const SORT_COLUMNS: &str = "schemacrawler.format.sort_alphabetically.table_columns";
pub const SORT_ROUTINES: &str = "schemacrawler.format.sort_alphabetically.routines";
pub const SORT_PARAMETERS: &str = "schemacrawler.format.sort_alphabetically.routine_columns";

pub const MAX_WORKERS: &str = "schemacrawler.crawl.max_workers";
pub const TIMEOUT_SECONDS: &str = "schemacrawler.crawl.timeout_seconds";

/// Prefix shared by every crawler-owned key.
pub const NAMESPACE: &str = "schemacrawler.";

/// Built-in defaults, the lowest configuration layer.
pub const DEFAULTS: &[(&str, &str)] = &[
    ("schemacrawler.schema.pattern.include", ".*"),
    ("schemacrawler.schema.pattern.exclude", ""),
    ("schemacrawler.table.pattern.include", ".*"),
    ("schemacrawler.table.pattern.exclude", ""),
    ("schemacrawler.column.pattern.include", ".*"),
    ("schemacrawler.column.pattern.exclude", ""),
    ("schemacrawler.routine.pattern.include", ".*"),
    ("schemacrawler.routine.pattern.exclude", ""),
    ("schemacrawler.routine.inout.pattern.include", ".*"),
    ("schemacrawler.routine.inout.pattern.exclude", ""),
    ("schemacrawler.sequence.pattern.include", ""),
    ("schemacrawler.sequence.pattern.exclude", ""),
    ("schemacrawler.synonym.pattern.include", ""),
    ("schemacrawler.synonym.pattern.exclude", ""),
    (INFO_LEVEL, "standard"),
    (OUTPUT_FORMAT, "text"),
    (SORT_TABLES, "true"),
    (SORT_COLUMNS, "false"),
    (SORT_ROUTINES, "true"),
    (SORT_PARAMETERS, "false"),
    (PORTABLE_NAMES, "false"),
    (SHOW_UNQUALIFIED_NAMES, "false"),
    (MAX_WORKERS, "4"),
    (TIMEOUT_SECONDS, "60"),
];

/// Whether `key` belongs to the crawler itself and so can never name a query.
pub fn is_reserved(key: &str) -> bool {
    key.starts_with(NAMESPACE)
        || matches!(
            key,
            URL | USER | PASSWORD | INFO_LEVEL | OUTPUT_FORMAT | NO_INFO
        )
}
