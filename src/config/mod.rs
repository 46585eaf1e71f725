//! Configuration module.
//!
//! Handles layered key-value configuration, connection settings, and the
//! typed crawl options read from them.

mod connection;
pub mod keys;
mod options;
mod settings;

pub use connection::{ConnectionConfig, ConnectionError, ConnectionResult, Driver};
pub use options::{CrawlOptions, InfoLevel, SortOptions};
pub use settings::{expand_env_vars, Config, ConfigError, SettingsError};
