//! Command dispatch.
//!
//! A command name resolves, in order, to:
//!
//! 1. a built-in report: `list`, `brief`, `schema`, `details`
//! 2. a built-in query: `count`, `dump`
//! 3. a named query: a configuration key equal to the name, whose value is
//!    the SQL template
//! 4. a literal query: the name itself, when it starts with a SQL keyword
//!
//! Anything else is a configuration error, reported before connecting.
//!
//! Reports and table-scoped queries need a catalog; other queries run
//! against the connection alone.

mod query;
mod report;

pub use query::{QueryTemplate, TemplateError, TemplateResult, VARIABLES};
pub use report::{
    ColumnReport, ForeignKeyReport, IndexReport, ParameterReport, Report, ReportKind,
    RoutineReport, SchemaReport, SequenceAttributes, SequenceReport, SynonymReport, TableReport,
};

use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::config::{keys, Config, ConfigError};
use crate::connection::{QueryExecutor, QueryResult};
use crate::error::{Warning, WarningKind};

/// Row count of every table.
pub const COUNT_TEMPLATE: &str = "SELECT COUNT(*) FROM ${table}";

/// Full contents of every table, in a stable order.
pub const DUMP_TEMPLATE: &str = "SELECT ${columns} FROM ${table} ORDER BY ${columns}";

const SQL_KEYWORDS: [&str; 5] = ["SELECT", "WITH", "VALUES", "PRAGMA", "EXPLAIN"];

/// Errors that stop a command from running at all.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Command '{0}' needs a catalog")]
    MissingCatalog(String),

    #[error("Command '{0}' needs a database connection")]
    MissingConnection(String),
}

pub type DispatchResult<T> = Result<T, DispatchError>;

/// A resolved command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Report(ReportKind),
    Query {
        name: String,
        template: QueryTemplate,
    },
}

impl Command {
    /// Resolve a command name against the merged configuration.
    pub fn resolve(name: &str, config: &Config) -> Result<Self, ConfigError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::UnknownCommand(String::new()));
        }

        if let Some(kind) = ReportKind::from_name(name) {
            return Ok(Command::Report(kind));
        }

        let builtin = match name.to_lowercase().as_str() {
            "count" => Some(COUNT_TEMPLATE),
            "dump" => Some(DUMP_TEMPLATE),
            _ => None,
        };
        if let Some(sql) = builtin {
            return Ok(Command::query(name.to_lowercase(), sql));
        }

        if !keys::is_reserved(name) {
            if let Some(sql) = config.get(name).filter(|sql| !sql.trim().is_empty()) {
                return Ok(Command::query(name, sql));
            }
        }

        if looks_like_sql(name) {
            return Ok(Command::query("query", name));
        }

        Err(ConfigError::UnknownCommand(name.to_string()))
    }

    fn query(name: impl Into<String>, sql: &str) -> Self {
        Command::Query {
            name: name.into(),
            template: QueryTemplate::new(sql),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Command::Report(kind) => kind.as_str(),
            Command::Query { name, .. } => name,
        }
    }

    /// Whether the command reads the catalog, and so needs a crawl.
    pub fn requires_catalog(&self) -> bool {
        match self {
            Command::Report(_) => true,
            Command::Query { template, .. } => template.is_table_scoped(),
        }
    }

    /// Run the command.
    ///
    /// Query failures and template problems skip the affected query and are
    /// returned as warnings on the result.
    pub async fn execute(
        &self,
        catalog: Option<&Catalog>,
        executor: Option<&dyn QueryExecutor>,
        show_database_info: bool,
    ) -> DispatchResult<RenderableResult> {
        info!(command = self.name(), "dispatching");
        let mut warnings: Vec<Warning> = catalog.map(|c| c.warnings.clone()).unwrap_or_default();

        let body = match self {
            Command::Report(kind) => {
                let catalog =
                    catalog.ok_or_else(|| DispatchError::MissingCatalog(self.name().to_string()))?;
                ResultBody::Report(Report::build(catalog, *kind, show_database_info))
            }
            Command::Query { name, template } => {
                let executor =
                    executor.ok_or_else(|| DispatchError::MissingConnection(name.clone()))?;
                let outputs = if template.is_table_scoped() {
                    let catalog =
                        catalog.ok_or_else(|| DispatchError::MissingCatalog(name.clone()))?;
                    run_per_table(template, catalog, executor, &mut warnings).await
                } else {
                    run_once(template, executor, &mut warnings).await
                };
                ResultBody::Query(outputs)
            }
        };

        Ok(RenderableResult {
            title: self.name().to_string(),
            body,
            warnings,
        })
    }
}

fn looks_like_sql(text: &str) -> bool {
    let first = text
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default();
    SQL_KEYWORDS
        .iter()
        .any(|keyword| keyword.eq_ignore_ascii_case(first))
}

async fn run_per_table(
    template: &QueryTemplate,
    catalog: &Catalog,
    executor: &dyn QueryExecutor,
    warnings: &mut Vec<Warning>,
) -> Vec<QueryOutput> {
    let mut outputs = Vec::new();
    for table in catalog.tables() {
        let table_name = catalog.table_name(&table.id);
        let sql = match template.expand(Some(catalog), Some(table)) {
            Ok(sql) => sql,
            Err(err) => {
                // The same variable fails for every table.
                skipped(warnings, WarningKind::TemplateSubstitution, template.sql(), &err);
                return Vec::new();
            }
        };
        match executor.execute(&sql).await {
            Ok(result) => outputs.push(QueryOutput {
                table: Some(table_name),
                sql,
                result,
            }),
            Err(err) => skipped(warnings, WarningKind::QueryFailed, &sql, &err),
        }
    }
    outputs
}

async fn run_once(
    template: &QueryTemplate,
    executor: &dyn QueryExecutor,
    warnings: &mut Vec<Warning>,
) -> Vec<QueryOutput> {
    let sql = match template.expand(None, None) {
        Ok(sql) => sql,
        Err(err) => {
            skipped(warnings, WarningKind::TemplateSubstitution, template.sql(), &err);
            return Vec::new();
        }
    };
    match executor.execute(&sql).await {
        Ok(result) => vec![QueryOutput {
            table: None,
            sql,
            result,
        }],
        Err(err) => {
            skipped(warnings, WarningKind::QueryFailed, &sql, &err);
            Vec::new()
        }
    }
}

fn skipped(warnings: &mut Vec<Warning>, kind: WarningKind, sql: &str, err: &dyn std::error::Error) {
    warn!(%sql, error = %err, "query skipped");
    warnings.push(Warning::new(kind, format!("{err} [{sql}]")));
}

/// Resolve `command_name` and run it.
pub async fn dispatch(
    catalog: Option<&Catalog>,
    command_name: &str,
    config: &Config,
    executor: Option<&dyn QueryExecutor>,
) -> DispatchResult<RenderableResult> {
    let command = Command::resolve(command_name, config)?;
    let show_database_info = !config.get_bool(keys::NO_INFO, false)?;
    command
        .execute(catalog, executor, show_database_info)
        .await
}

/// The dispatcher's output, ready for a renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderableResult {
    pub title: String,
    pub body: ResultBody,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum ResultBody {
    Report(Report),
    Query(Vec<QueryOutput>),
}

/// One executed query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOutput {
    /// The table the query ran for, when table-scoped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub sql: String,
    pub result: QueryResult,
}
