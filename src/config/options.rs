//! Typed crawl options derived from the merged [`Config`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;

use super::keys;
use super::settings::Config;
use crate::catalog::NameStyle;
use crate::error::{CrawlError, CrawlResult};
use crate::filter::{Category, RuleSet};
use crate::metadata::MetadataKind;

/// Depth of metadata retrieval. Each level retrieves everything the level
/// below it does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InfoLevel {
    /// Schemas, tables and routines only.
    Minimum,
    /// Adds columns, indexes, foreign keys, routine parameters and remarks.
    #[default]
    Standard,
    /// Adds sequences and synonyms.
    Detailed,
    /// Adds view and routine definitions.
    Maximum,
}

impl InfoLevel {
    pub const ALL: [InfoLevel; 4] = [
        InfoLevel::Minimum,
        InfoLevel::Standard,
        InfoLevel::Detailed,
        InfoLevel::Maximum,
    ];

    /// Whether this level fetches `kind` at all.
    pub fn retrieves(self, kind: MetadataKind) -> bool {
        let required = match kind {
            MetadataKind::Schemas | MetadataKind::Tables | MetadataKind::Routines => {
                InfoLevel::Minimum
            }
            MetadataKind::Columns
            | MetadataKind::Indexes
            | MetadataKind::ForeignKeys
            | MetadataKind::Parameters => InfoLevel::Standard,
            MetadataKind::Sequences | MetadataKind::Synonyms => InfoLevel::Detailed,
        };
        self >= required
    }

    pub fn retrieves_remarks(self) -> bool {
        self >= InfoLevel::Standard
    }

    pub fn retrieves_definitions(self) -> bool {
        self >= InfoLevel::Maximum
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InfoLevel::Minimum => "minimum",
            InfoLevel::Standard => "standard",
            InfoLevel::Detailed => "detailed",
            InfoLevel::Maximum => "maximum",
        }
    }
}

impl FromStr for InfoLevel {
    type Err = CrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "minimum" => Ok(InfoLevel::Minimum),
            "standard" => Ok(InfoLevel::Standard),
            "detailed" => Ok(InfoLevel::Detailed),
            "maximum" => Ok(InfoLevel::Maximum),
            other => Err(CrawlError::InvalidInfoLevel(other.to_string())),
        }
    }
}

impl fmt::Display for InfoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which collections are sorted alphabetically instead of in their natural
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SortOptions {
    /// Natural order for tables is foreign-key dependency order.
    pub tables: bool,
    /// Natural order for columns is ordinal position.
    pub columns: bool,
    /// Natural order for routines is specific name.
    pub routines: bool,
    /// Natural order for parameters is ordinal position.
    pub parameters: bool,
}

impl Default for SortOptions {
    fn default() -> Self {
        Self {
            tables: true,
            columns: false,
            routines: true,
            parameters: false,
        }
    }
}

/// Everything a crawl needs to know, read once from [`Config`].
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub info_level: InfoLevel,
    pub rules: RuleSet,
    pub sort: SortOptions,
    pub naming: NameStyle,
    /// Upper bound on concurrent metadata requests.
    pub max_workers: usize,
    /// Deadline for the whole retrieval phase.
    pub timeout: Duration,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            info_level: InfoLevel::default(),
            rules: RuleSet::default(),
            sort: SortOptions::default(),
            naming: NameStyle::default(),
            max_workers: 4,
            timeout: Duration::from_secs(60),
        }
    }
}

impl CrawlOptions {
    /// Whether a crawl with these options fetches `kind`: the info level
    /// must include it, and no category governing it may have an empty
    /// include pattern.
    pub fn plans(&self, kind: MetadataKind) -> bool {
        self.info_level.retrieves(kind)
            && governing_categories(kind)
                .iter()
                .all(|c| !self.rules.rule(*c).excludes_all())
    }

    /// Read options from `config`. Keys missing from `config` take the
    /// built-in defaults.
    pub fn from_config(config: &Config) -> CrawlResult<Self> {
        let defaults = Self::default();

        let info_level = match config.get(keys::INFO_LEVEL) {
            Some(level) => level.parse()?,
            None => defaults.info_level,
        };

        let sort = SortOptions {
            tables: config.get_bool(keys::SORT_TABLES, defaults.sort.tables)?,
            columns: config.get_bool(keys::SORT_COLUMNS, defaults.sort.columns)?,
            routines: config.get_bool(keys::SORT_ROUTINES, defaults.sort.routines)?,
            parameters: config.get_bool(keys::SORT_PARAMETERS, defaults.sort.parameters)?,
        };

        let naming = if config.get_bool(keys::PORTABLE_NAMES, false)? {
            NameStyle::Portable
        } else if config.get_bool(keys::SHOW_UNQUALIFIED_NAMES, false)? {
            NameStyle::Unqualified
        } else {
            NameStyle::Qualified
        };

        let max_workers = config
            .get_u64(keys::MAX_WORKERS, defaults.max_workers as u64)?
            .max(1) as usize;
        let timeout = Duration::from_secs(
            config.get_u64(keys::TIMEOUT_SECONDS, defaults.timeout.as_secs())?,
        );

        Ok(Self {
            info_level,
            rules: RuleSet::from_config(config)?,
            sort,
            naming,
            max_workers,
            timeout,
        })
    }
}

fn governing_categories(kind: MetadataKind) -> &'static [Category] {
    match kind {
        MetadataKind::Schemas => &[Category::Schema],
        MetadataKind::Tables | MetadataKind::Indexes | MetadataKind::ForeignKeys => {
            &[Category::Schema, Category::Table]
        }
        MetadataKind::Columns => &[Category::Schema, Category::Table, Category::Column],
        MetadataKind::Routines => &[Category::Schema, Category::Routine],
        MetadataKind::Parameters => &[Category::Schema, Category::Routine, Category::Parameter],
        MetadataKind::Sequences => &[Category::Schema, Category::Sequence],
        MetadataKind::Synonyms => &[Category::Schema, Category::Synonym],
    }
}
