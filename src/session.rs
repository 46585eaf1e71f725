//! One end-to-end run: configure, connect, crawl, dispatch, render.
//!
//! ```text
//! Idle ─► ConnectionAcquired ─► MetadataRetrieved ─► Filtered ─► CatalogBuilt
//!                │                                                    │
//!                └──────────── (no catalog needed) ───────────┐       │
//!                                                             ▼       ▼
//!                                  Closed ◄─ Rendered ◄─ CommandDispatched
//! ```
//!
//! Everything that can be checked without a database (patterns, command
//! name, output format, info level) is checked before connecting. The
//! connection is released on every exit path. A failed run reports the last
//! stage it completed, and keeps the catalog if one was built.

use std::fmt;

use tracing::debug;

use crate::catalog::Catalog;
use crate::command::{Command, DispatchError};
use crate::config::{keys, Config, ConfigError, ConnectionConfig, ConnectionError, CrawlOptions};
use crate::connection::{self, Connection};
use crate::crawl::crawl_staged;
use crate::error::{CrawlError, Warning};
use crate::render::{render, OutputFormat, RenderError};

/// Progress of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Idle,
    ConnectionAcquired,
    MetadataRetrieved,
    Filtered,
    CatalogBuilt,
    CommandDispatched,
    Rendered,
    Closed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idle => "idle",
            Stage::ConnectionAcquired => "connection acquired",
            Stage::MetadataRetrieved => "metadata retrieved",
            Stage::Filtered => "filtered",
            Stage::CatalogBuilt => "catalog built",
            Stage::CommandDispatched => "command dispatched",
            Stage::Rendered => "rendered",
            Stage::Closed => "closed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that end a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Crawl failed: {0}")]
    Crawl(#[from] CrawlError),

    #[error("Command failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Rendering failed: {0}")]
    Render(#[from] RenderError),
}

pub type RunResult<T> = Result<T, RunError>;

/// A failed run, with whatever it had produced before failing.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct RunFailure {
    #[source]
    pub error: RunError,
    /// Last stage completed before the failure.
    pub stage: Stage,
    /// The crawled catalog, when the failure came after it was built.
    pub catalog: Option<Box<Catalog>>,
}

impl From<RunError> for RunFailure {
    fn from(error: RunError) -> Self {
        Self {
            error,
            stage: Stage::Idle,
            catalog: None,
        }
    }
}

/// What to run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Fully merged configuration.
    pub config: Config,
    pub command: String,
    /// Overrides the `url`/`user`/`password` keys of `config`.
    pub connection: Option<ConnectionConfig>,
}

impl RunRequest {
    pub fn new(config: Config, command: impl Into<String>) -> Self {
        Self {
            config,
            command: command.into(),
            connection: None,
        }
    }

    pub fn with_connection(mut self, connection: ConnectionConfig) -> Self {
        self.connection = Some(connection);
        self
    }
}

/// A successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub output: String,
    /// Last stage completed before the connection was closed.
    pub stage: Stage,
    pub warnings: Vec<Warning>,
    /// The crawled catalog, when the command needed one.
    pub catalog: Option<Catalog>,
}

/// Settings checked up front, before any connection exists.
struct Plan {
    options: CrawlOptions,
    command: Command,
    format: OutputFormat,
    show_database_info: bool,
    connection: ConnectionConfig,
}

impl Plan {
    fn from_request(request: RunRequest) -> RunResult<Self> {
        let config = &request.config;
        let options = CrawlOptions::from_config(config)?;
        let command = Command::resolve(&request.command, config)?;
        let format: OutputFormat = config.get_or(keys::OUTPUT_FORMAT, "text").parse()?;
        let show_database_info = !config.get_bool(keys::NO_INFO, false)?;
        let connection = match request.connection {
            Some(connection) => connection,
            None => ConnectionConfig::from_config(config)?,
        };

        Ok(Self {
            options,
            command,
            format,
            show_database_info,
            connection,
        })
    }
}

struct Tracker {
    stage: Stage,
}

impl Tracker {
    fn advance(&mut self, next: Stage) {
        debug!(from = %self.stage, to = %next, "stage transition");
        self.stage = next;
    }
}

/// Execute one request end to end.
pub async fn run(request: RunRequest) -> Result<RunOutcome, RunFailure> {
    let plan = Plan::from_request(request)?;
    let connection = connection::open(&plan.connection).map_err(RunError::from)?;
    run_on(&plan, connection).await
}

async fn run_on(plan: &Plan, connection: Box<dyn Connection>) -> Result<RunOutcome, RunFailure> {
    let mut tracker = Tracker { stage: Stage::Idle };
    tracker.advance(Stage::ConnectionAcquired);

    let mut catalog = None;
    let result = execute(plan, connection.as_ref(), &mut tracker, &mut catalog).await;

    drop(connection);
    let completed = tracker.stage;
    tracker.advance(Stage::Closed);

    match result {
        Ok((output, warnings)) => Ok(RunOutcome {
            output,
            stage: completed,
            warnings,
            catalog,
        }),
        Err(error) => {
            debug!(stage = %completed, %error, "run failed");
            Err(RunFailure {
                error,
                stage: completed,
                catalog: catalog.map(Box::new),
            })
        }
    }
}

async fn execute(
    plan: &Plan,
    connection: &dyn Connection,
    tracker: &mut Tracker,
    catalog: &mut Option<Catalog>,
) -> RunResult<(String, Vec<Warning>)> {
    if plan.command.requires_catalog() {
        let built =
            crawl_staged(connection.metadata(), &plan.options, |stage| tracker.advance(stage))
                .await?;
        *catalog = Some(built);
    }

    let result = plan
        .command
        .execute(
            catalog.as_ref(),
            Some(connection.executor()),
            plan.show_database_info,
        )
        .await?;
    tracker.advance(Stage::CommandDispatched);

    let output = render(&result, plan.format)?;
    tracker.advance(Stage::Rendered);

    Ok((output, result.warnings))
}
