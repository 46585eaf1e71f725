//! Include/exclude pattern rules.
//!
//! Every entity category has one [`InclusionRule`]: an include regex and an
//! exclude regex, both matched against the entity's fully qualified name.
//! An identifier is included iff it matches include and does not match
//! exclude, so exclude always wins when both match.
//!
//! | pattern          | empty means          |
//! |------------------|----------------------|
//! | include          | match nothing (the category is not even fetched) |
//! | exclude          | exclude nothing      |
//!
//! Patterns must match the whole identifier, and are compiled once per run.
//! Look-around is supported, so the customary "every schema but one" form
//! works:
//!
//! ```text
//! schemacrawler.schema.pattern.include = .*\.(?!FOR_LINT).*
//! ```

mod records;

pub use records::apply;

use std::fmt;

use fancy_regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::config::{Config, ConfigError};
use crate::error::{Warning, WarningKind};

/// Entity categories that carry their own inclusion rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Schema = 0,
    Table = 1,
    Column = 2,
    Routine = 3,
    Parameter = 4,
    Sequence = 5,
    Synonym = 6,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Schema,
        Category::Table,
        Category::Column,
        Category::Routine,
        Category::Parameter,
        Category::Sequence,
        Category::Synonym,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Schema => "schema",
            Category::Table => "table",
            Category::Column => "column",
            Category::Routine => "routine",
            Category::Parameter => "routine parameter",
            Category::Sequence => "sequence",
            Category::Synonym => "synonym",
        }
    }

    fn key_prefix(&self) -> &'static str {
        match self {
            Category::Schema => "schemacrawler.schema.pattern",
            Category::Table => "schemacrawler.table.pattern",
            Category::Column => "schemacrawler.column.pattern",
            Category::Routine => "schemacrawler.routine.pattern",
            Category::Parameter => "schemacrawler.routine.inout.pattern",
            Category::Sequence => "schemacrawler.sequence.pattern",
            Category::Synonym => "schemacrawler.synonym.pattern",
        }
    }

    pub fn include_key(&self) -> String {
        format!("{}.include", self.key_prefix())
    }

    pub fn exclude_key(&self) -> String {
        format!("{}.exclude", self.key_prefix())
    }

    /// Include pattern used when the configuration has none.
    pub fn default_include(&self) -> &'static str {
        match self {
            Category::Sequence | Category::Synonym => "",
            _ => ".*",
        }
    }

    /// The category whose rule is evaluated first, and whose exclusion
    /// short-circuits this one.
    pub fn parent(&self) -> Option<Category> {
        match self {
            Category::Schema => None,
            Category::Column => Some(Category::Table),
            Category::Parameter => Some(Category::Routine),
            Category::Table | Category::Routine | Category::Sequence | Category::Synonym => {
                Some(Category::Schema)
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An include/exclude regex pair.
#[derive(Debug, Clone)]
pub struct InclusionRule {
    include: Option<Regex>,
    exclude: Option<Regex>,
    include_pattern: String,
    exclude_pattern: String,
}

impl InclusionRule {
    pub fn new(include: &str, exclude: &str) -> Result<Self, fancy_regex::Error> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
            include_pattern: include.to_string(),
            exclude_pattern: exclude.to_string(),
        })
    }

    pub fn include_all() -> Self {
        Self {
            include: Regex::new("^(?:.*)$").ok(),
            exclude: None,
            include_pattern: ".*".to_string(),
            exclude_pattern: String::new(),
        }
    }

    pub fn exclude_all() -> Self {
        Self {
            include: None,
            exclude: None,
            include_pattern: String::new(),
            exclude_pattern: String::new(),
        }
    }

    /// Whether `identifier` is included.
    pub fn test(&self, identifier: &str) -> bool {
        let Some(include) = &self.include else {
            return false;
        };
        matches(include, identifier)
            && !self
                .exclude
                .as_ref()
                .is_some_and(|exclude| matches(exclude, identifier))
    }

    /// An empty include pattern: nothing in the category is wanted.
    pub fn excludes_all(&self) -> bool {
        self.include.is_none()
    }

    /// Narrower than "everything", without being "nothing".
    pub fn is_restrictive(&self) -> bool {
        self.include.is_some() && (self.include_pattern != ".*" || self.exclude.is_some())
    }

    pub fn include_pattern(&self) -> &str {
        &self.include_pattern
    }

    pub fn exclude_pattern(&self) -> &str {
        &self.exclude_pattern
    }
}

impl Default for InclusionRule {
    fn default() -> Self {
        Self::include_all()
    }
}

/// Compile a full-match pattern. Empty patterns compile to `None`.
fn compile(pattern: &str) -> Result<Option<Regex>, fancy_regex::Error> {
    if pattern.trim().is_empty() {
        return Ok(None);
    }
    Regex::new(&format!("^(?:{pattern})$")).map(Some)
}

/// A pattern that gives up (backtrack limit) matches nothing.
fn matches(regex: &Regex, identifier: &str) -> bool {
    regex.is_match(identifier).unwrap_or_else(|err| {
        warn!(pattern = regex.as_str(), identifier, error = %err, "pattern evaluation failed");
        false
    })
}

/// The inclusion rule for every category.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: [InclusionRule; 7],
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            rules: Category::ALL.map(|category| {
                if category.default_include().is_empty() {
                    InclusionRule::exclude_all()
                } else {
                    InclusionRule::include_all()
                }
            }),
        }
    }
}

impl RuleSet {
    /// Compile every category's rule from `config`, falling back to the
    /// category defaults for missing keys.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut rules = Self::default();
        for category in Category::ALL {
            let include_key = category.include_key();
            let exclude_key = category.exclude_key();
            let include = config.get_or(&include_key, category.default_include());
            let exclude = config.get_or(&exclude_key, "");

            let rule = InclusionRule::new(include, exclude).map_err(|source| {
                let (key, pattern) = if compile(include).is_err() {
                    (include_key.clone(), include)
                } else {
                    (exclude_key.clone(), exclude)
                };
                ConfigError::InvalidPattern {
                    key,
                    pattern: pattern.to_string(),
                    source,
                }
            })?;
            rules.rules[category as usize] = rule;
        }
        Ok(rules)
    }

    pub fn with_rule(mut self, category: Category, rule: InclusionRule) -> Self {
        self.rules[category as usize] = rule;
        self
    }

    pub fn rule(&self, category: Category) -> &InclusionRule {
        &self.rules[category as usize]
    }

    pub fn included(&self, category: Category, identifier: &str) -> bool {
        self.rule(category).test(identifier)
    }

    /// Configuration-level warnings.
    ///
    /// Schema exclusion short-circuits before any object-level rule runs, so
    /// restricting both levels at once often hides more than intended.
    pub fn validate(&self) -> Vec<Warning> {
        let schema = self.rule(Category::Schema);
        if !schema.is_restrictive() {
            return Vec::new();
        }

        Category::ALL
            .into_iter()
            .filter(|c| c.parent() == Some(Category::Schema))
            .filter(|c| self.rule(*c).is_restrictive())
            .map(|c| {
                Warning::new(
                    WarningKind::PatternOverlap,
                    format!(
                        "both schema and {} patterns are restrictive; schema exclusion is applied first",
                        c
                    ),
                )
            })
            .collect()
    }
}

/// Whether `identifier` of `category` passes `rules`.
pub fn included(identifier: &str, category: Category, rules: &RuleSet) -> bool {
    rules.included(category, identifier)
}
