//! Structured logging configuration.

use crate::config::LoggingSettings;
use crate::{Error, Result};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for unknown names.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(Error::InvalidConfig(format!(
                "unknown log format '{other}' (expected pretty or json)"
            ))),
        }
    }
}

/// Logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Event filter.
    pub filter: EnvFilter,
    /// Append to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds a logging configuration from resolved settings.
    ///
    /// Without explicit filter directives the level is `info`, or `debug`
    /// when `verbose` is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for an unknown format or malformed
    /// filter directives.
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Result<Self> {
        let format = settings
            .format
            .as_deref()
            .map(LogFormat::parse)
            .transpose()?
            .unwrap_or_default();

        let directives = settings
            .filter
            .clone()
            .unwrap_or_else(|| default_directives(verbose).to_string());
        let filter = EnvFilter::try_new(&directives)
            .map_err(|e| Error::InvalidConfig(format!("invalid log filter '{directives}': {e}")))?;

        Ok(Self {
            format,
            filter,
            file: settings.file.clone(),
        })
    }
}

const fn default_directives(verbose: bool) -> &'static str {
    if verbose {
        "debug,mongodb=info,hyper=info"
    } else {
        "info"
    }
}
