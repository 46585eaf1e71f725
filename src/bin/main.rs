//! Schemascope CLI - crawl database metadata and run reports or queries
//!
//! Usage:
//!   schemascope --url <url> --command <command> [options]
//!
//! Examples:
//!   schemascope --url sqlite:books.db --command brief
//!   schemascope --url sqlite:books.db --command dump --tables 'main\.Books'
//!   schemascope --url sqlite:books.db --command schema --outputformat json
//!   schemascope -g crawl.properties --command query1

use clap::Parser;
use schemascope::config::{keys, Config, SettingsError};
use schemascope::filter::Category;
use schemascope::session::{run, RunRequest};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schemascope")]
#[command(about = "Schemascope - crawl relational database metadata into a deterministic catalog")]
#[command(version)]
struct Cli {
    /// Connection URL, e.g. sqlite:books.db or sqlite::memory:
    #[arg(long)]
    url: Option<String>,

    /// Database user
    #[arg(long)]
    user: Option<String>,

    /// Database password
    #[arg(long)]
    password: Option<String>,

    /// Config file (.toml, or .properties for anything else)
    #[arg(short = 'g', long = "config")]
    config: Option<PathBuf>,

    /// Include pattern for schemas
    #[arg(long)]
    schemas: Option<String>,

    /// Include pattern for tables
    #[arg(long)]
    tables: Option<String>,

    /// Include pattern for routines
    #[arg(long)]
    routines: Option<String>,

    /// Include pattern for sequences
    #[arg(long)]
    sequences: Option<String>,

    /// Include pattern for synonyms
    #[arg(long)]
    synonyms: Option<String>,

    /// Sort columns alphabetically instead of by ordinal
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    sortcolumns: Option<bool>,

    /// Sort tables alphabetically instead of by foreign key dependencies
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    sorttables: Option<bool>,

    /// Sort routines alphabetically
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    sortroutines: Option<bool>,

    /// Sort routine parameters alphabetically instead of by ordinal
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    sortinout: Option<bool>,

    /// Render names without catalog or schema qualification
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    portablenames: Option<bool>,

    /// Retrieval depth: minimum, standard, detailed, maximum
    #[arg(long)]
    infolevel: Option<String>,

    /// Report (list, brief, schema, details), count, dump, a named query, or SQL
    #[arg(short, long)]
    command: String,

    /// Output format: text or json
    #[arg(long)]
    outputformat: Option<String>,

    /// Write output to this file instead of stdout
    #[arg(long)]
    outputfile: Option<PathBuf>,

    /// Leave database information out of reports
    #[arg(long)]
    noinfo: bool,

    /// Crawl timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Log progress and print warnings
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// The command-line layer of the configuration.
    fn config_layer(&self) -> Config {
        let mut layer = Config::new();
        let mut set = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                layer = std::mem::take(&mut layer).with(key, value);
            }
        };

        set(keys::URL, self.url.clone());
        set(keys::USER, self.user.clone());
        set(keys::PASSWORD, self.password.clone());

        // Patterns set only the include half; excludes from the file survive.
        let patterns = [
            (Category::Schema, &self.schemas),
            (Category::Table, &self.tables),
            (Category::Routine, &self.routines),
            (Category::Sequence, &self.sequences),
            (Category::Synonym, &self.synonyms),
        ];
        for (category, pattern) in patterns {
            set(&category.include_key(), pattern.clone());
        }

        let flags = [
            (keys::SORT_COLUMNS, self.sortcolumns),
            (keys::SORT_TABLES, self.sorttables),
            (keys::SORT_ROUTINES, self.sortroutines),
            (keys::SORT_PARAMETERS, self.sortinout),
            (keys::PORTABLE_NAMES, self.portablenames),
        ];
        for (key, flag) in flags {
            set(key, flag.map(|f| f.to_string()));
        }

        set(keys::INFO_LEVEL, self.infolevel.clone());
        set(keys::OUTPUT_FORMAT, self.outputformat.clone());
        set(keys::TIMEOUT_SECONDS, self.timeout.map(|t| t.to_string()));
        if self.noinfo {
            set(keys::NO_INFO, Some("true".to_string()));
        }

        layer
    }

    fn file_layer(&self) -> Result<Config, SettingsError> {
        match &self.config {
            Some(path) => Config::from_file(path),
            None => Config::load(),
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "schemascope=info"
    } else {
        "schemascope=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let file = match cli.file_layer() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error reading config: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let config = Config::layered([Config::defaults(), file, cli.config_layer()]);

    let outcome = match run(RunRequest::new(config, cli.command.clone())).await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    for warning in &outcome.warnings {
        if cli.verbose {
            eprintln!("warning: {}", warning);
        } else {
            tracing::warn!(%warning);
        }
    }

    match &cli.outputfile {
        Some(path) => {
            if let Err(e) = fs::write(path, &outcome.output) {
                eprintln!("Error writing '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
        None => print!("{}", outcome.output),
    }

    ExitCode::SUCCESS
}
