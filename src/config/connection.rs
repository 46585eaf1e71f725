//! Database connection configuration.
//!
//! Connection settings come from the command line, the merged [`Config`], or
//! environment variables:
//! - `SCHEMASCOPE_URL`: Connection URL (`sqlite:<path>`, `sqlite::memory:`)
//! - `SCHEMASCOPE_USER`: User name (optional)
//! - `SCHEMASCOPE_PASSWORD`: Password (optional)
//!
//! URL, user and password all support `${ENV_VAR}` expansion.

use std::env;

use super::keys;
use super::settings::{expand_env_vars, Config, SettingsError};

/// Errors opening or using a database connection.
///
/// Failing to open a connection is always fatal to a run.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("No connection URL given")]
    MissingUrl,

    #[error("Unsupported driver: {0}. Supported: sqlite")]
    UnsupportedDriver(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to open {url}: {message}")]
    OpenFailed { url: String, message: String },

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Connection is no longer usable: {0}")]
    Broken(String),
}

impl From<SettingsError> for ConnectionError {
    fn from(err: SettingsError) -> Self {
        Self::InvalidConfig(err.to_string())
    }
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Supported database drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    /// SQLite (file or in-memory)
    Sqlite,
}

impl Driver {
    /// Split a connection URL into its driver and driver-specific target.
    ///
    /// Accepts `sqlite:<path>`, `sqlite://<path>`, `sqlite::memory:` and the
    /// `jdbc:`-prefixed forms of each.
    pub fn from_url(url: &str) -> ConnectionResult<(Self, String)> {
        let trimmed = url.trim();
        let unprefixed = trimmed.strip_prefix("jdbc:").unwrap_or(trimmed);
        let (scheme, rest) = unprefixed
            .split_once(':')
            .ok_or_else(|| ConnectionError::InvalidConfig(format!("not a URL: {trimmed}")))?;

        match scheme.to_lowercase().as_str() {
            "sqlite" | "sqlite3" => {
                let target = rest.strip_prefix("//").unwrap_or(rest);
                if target.is_empty() {
                    return Err(ConnectionError::InvalidConfig(format!(
                        "missing database path in {trimmed}"
                    )));
                }
                Ok((Driver::Sqlite, target.to_string()))
            }
            other => Err(ConnectionError::UnsupportedDriver(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::Sqlite => "sqlite",
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ConnectionConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            user: None,
            password: None,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Read `url`, `user` and `password` from the merged configuration.
    pub fn from_config(config: &Config) -> ConnectionResult<Self> {
        let url = config
            .get(keys::URL)
            .filter(|u| !u.trim().is_empty())
            .ok_or(ConnectionError::MissingUrl)?;

        Ok(Self {
            url: url.to_string(),
            user: config.get(keys::USER).map(str::to_string),
            password: config.get(keys::PASSWORD).map(str::to_string),
        })
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> ConnectionResult<Self> {
        let url = env::var("SCHEMASCOPE_URL").map_err(|_| ConnectionError::MissingUrl)?;

        Ok(Self {
            url,
            user: env::var("SCHEMASCOPE_USER").ok(),
            password: env::var("SCHEMASCOPE_PASSWORD").ok(),
        })
    }

    /// Expand environment variables in every field.
    pub fn resolved(&self) -> ConnectionResult<Self> {
        Ok(Self {
            url: expand_env_vars(&self.url)?,
            user: self.user.as_deref().map(expand_env_vars).transpose()?,
            password: self.password.as_deref().map(expand_env_vars).transpose()?,
        })
    }

    /// Get the driver and its target for this URL.
    pub fn driver(&self) -> ConnectionResult<(Driver, String)> {
        Driver::from_url(&self.url)
    }

    /// URL safe for logs.
    pub fn display_url(&self) -> &str {
        &self.url
    }
}
