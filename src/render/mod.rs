//! Output renderers for [`RenderableResult`].
//!
//! Both formats are deterministic: the same result always renders to the
//! same bytes, so output can be compared against golden files.

mod text;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::command::RenderableResult;
use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Formatting error")]
    Format(#[from] fmt::Error),
}

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "txt" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => Err(ConfigError::UnknownOutputFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render `result` in `format`.
pub fn render(result: &RenderableResult, format: OutputFormat) -> RenderResult<String> {
    match format {
        OutputFormat::Text => Ok(text::render(result)?),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(result)?;
            json.push('\n');
            Ok(json)
        }
    }
}
