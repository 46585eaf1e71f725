//! Layered key-value configuration.
//!
//! A run sees exactly one [`Config`], merged up front from three layers:
//! built-in defaults, an optional config file, and command-line arguments.
//! Later layers win on key collision. After merging the value is passed by
//! reference into every component; nothing looks configuration up globally.
//!
//! Config files are either TOML (nested tables flatten to dotted keys) or
//! Java-style `.properties`:
//!
//! ```toml
//! [schemacrawler.table.pattern]
//! include = ".*"
//! exclude = ".*_AUDIT"
//!
//! [schemacrawler.format]
//! portable_names = true
//!
//! query1 = "SELECT * FROM BOOKS.Books"
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::keys;

/// Error type for loading configuration files.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
}

/// Error type for configuration values that cannot be used.
///
/// These are all detected before a connection is attempted.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid pattern for {key}: {pattern:?}: {source}")]
    InvalidPattern {
        key: String,
        pattern: String,
        #[source]
        source: fancy_regex::Error,
    },

    #[error("Invalid boolean for {key}: {value:?}")]
    InvalidBoolean { key: String, value: String },

    #[error("Invalid number for {key}: {value:?}")]
    InvalidNumber { key: String, value: String },

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Unknown output format: {0}. Supported: text, json")]
    UnknownOutputFormat(String),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Immutable, pre-merged configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Config {
    values: BTreeMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in defaults, the lowest layer.
    pub fn defaults() -> Self {
        keys::DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// Merge layers in order; later layers override earlier ones.
    pub fn layered(layers: impl IntoIterator<Item = Config>) -> Self {
        let mut merged = Config::new();
        for layer in layers {
            merged.values.extend(layer.values);
        }
        merged
    }

    /// Return a copy with one more key set.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Read a boolean, accepting `true/false/yes/no/1/0`.
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => match value.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" => Ok(false),
                _ => Err(ConfigError::InvalidBoolean {
                    key: key.to_string(),
                    value: value.to_string(),
                }),
            },
        }
    }

    pub fn get_u64(&self, key: &str, default: u64) -> Result<u64, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber {
                    key: key.to_string(),
                    value: value.to_string(),
                }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Load a config file. `.toml` files are parsed as TOML, anything else as
    /// a `.properties` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::parse_toml(&content),
            _ => Ok(Self::parse_properties(&content)),
        }
    }

    /// Load the config file from the default locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `SCHEMASCOPE_CONFIG`
    /// 2. `./schemascope.toml`
    /// 3. `~/.config/schemascope/config.toml`
    ///
    /// Returns an empty layer if none exists.
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("SCHEMASCOPE_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("schemascope.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("schemascope").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Config::new())
    }

    /// Parse TOML, flattening nested tables into dotted keys.
    pub fn parse_toml(content: &str) -> Result<Self, SettingsError> {
        let table: toml::Table = toml::from_str(content)?;
        let mut config = Config::new();
        flatten_toml("", &table, &mut config.values);
        Ok(config)
    }

    /// Parse a `.properties` file.
    ///
    /// Supports `key=value`, `key: value` and `key value`, `#`/`!` comments,
    /// backslash escapes (including `\uXXXX`) and backslash line
    /// continuations.
    pub fn parse_properties(content: &str) -> Self {
        let mut config = Config::new();
        let mut logical = String::new();

        for raw in content.lines() {
            let line = raw.trim_start();
            if logical.is_empty()
                && (line.is_empty() || line.starts_with('#') || line.starts_with('!'))
            {
                continue;
            }

            let trailing = line.chars().rev().take_while(|c| *c == '\\').count();
            if trailing % 2 == 1 {
                logical.push_str(&line[..line.len() - 1]);
                continue;
            }
            logical.push_str(line);

            if let Some((key, value)) = split_property(&logical) {
                config.values.insert(unescape(key), unescape(value));
            }
            logical.clear();
        }

        if !logical.is_empty() {
            if let Some((key, value)) = split_property(&logical) {
                config.values.insert(unescape(key), unescape(value));
            }
        }

        config
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Config {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn flatten_toml(prefix: &str, table: &toml::Table, out: &mut BTreeMap<String, String>) {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            toml::Value::Table(nested) => flatten_toml(&full_key, nested, out),
            other => {
                out.insert(full_key, toml_scalar(other));
            }
        }
    }
}

fn toml_scalar(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Array(items) => items.iter().map(toml_scalar).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

fn is_separator_space(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\x0c')
}

/// Split a logical line into key and value. The key ends at the first
/// unescaped `=`, `:` or whitespace; whitespace around a single `=` or `:`
/// is part of the separator.
fn split_property(line: &str) -> Option<(&str, &str)> {
    let mut escaped = false;
    let mut end = line.len();
    for (idx, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        if ch == '\\' {
            escaped = true;
        } else if ch == '=' || ch == ':' || is_separator_space(ch) {
            end = idx;
            break;
        }
    }

    let key = &line[..end];
    if key.is_empty() {
        return None;
    }
    let rest = line[end..].trim_start_matches(is_separator_space);
    let value = rest
        .strip_prefix(['=', ':'])
        .map_or(rest, |v| v.trim_start_matches(is_separator_space));
    Some((key, value))
}

fn unescape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    // `\uXXXX` escapes are UTF-16 code units; surrogate pairs span two.
    let mut units: Vec<u16> = Vec::new();
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        if c == '\\' && chars.as_str().starts_with('u') {
            chars.next();
            if let Some(unit) = read_hex4(&mut chars) {
                units.push(unit);
                continue;
            }
            flush_units(&mut units, &mut result);
            result.push('u');
            continue;
        }
        flush_units(&mut units, &mut result);
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => result.push('\t'),
            Some('n') => result.push('\n'),
            Some('r') => result.push('\r'),
            Some('f') => result.push('\x0c'),
            Some(other) => result.push(other),
            None => {}
        }
    }
    flush_units(&mut units, &mut result);
    result
}

/// Four hex digits, consumed only when all four are present.
fn read_hex4(chars: &mut std::str::Chars<'_>) -> Option<u16> {
    let digits = chars.as_str().get(..4)?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let unit = u16::from_str_radix(digits, 16).ok()?;
    chars.nth(3);
    Some(unit)
}

/// Decode pending code units. Unpaired surrogates become U+FFFD.
fn flush_units(units: &mut Vec<u16>, out: &mut String) {
    out.extend(
        char::decode_utf16(units.drain(..)).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)),
    );
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if !(ch.is_alphanumeric() || ch == '_') {
                    break;
                }
                var_name.push(ch);
                chars.next();
            }
            if var_name.is_empty() {
                // Lone '$'
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
