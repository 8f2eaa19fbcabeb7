//! Observability setup.
//!
//! Logging goes through `tracing`; the subscriber is installed once per
//! process. Metrics are emitted through the `metrics` facade and are no-ops
//! until the host application installs a recorder.

mod logging;

pub use logging::{LogFormat, LoggingConfig};

use crate::config::LoggingSettings;
use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry};

/// Initializes logging from resolved settings.
///
/// # Errors
///
/// Returns an error if the settings are invalid, the log file cannot be
/// opened, or logging has already been initialized.
pub fn init_from_config(settings: &LoggingSettings, verbose: bool) -> Result<()> {
    init(LoggingConfig::from_settings(settings, verbose)?)
}

/// Installs the global `tracing` subscriber.
///
/// Events go to the configured file when one is set, otherwise to stderr.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed or the log
/// file cannot be opened.
pub fn init(config: LoggingConfig) -> Result<()> {
    let to_file = config.file.is_some();
    let writer = match &config.file {
        Some(path) => BoxMakeWriter::new(Mutex::new(open_log_file(path)?)),
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(true);
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Json => fmt.json().with_current_span(true).boxed(),
        LogFormat::Pretty => fmt.with_ansi(!to_file).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(config.filter)
        .try_init()
        .map_err(|e| Error::OperationFailed {
            operation: "observability_init".to_string(),
            cause: e.to_string(),
        })
}

/// Opens `path` for appending, creating missing parent directories.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
            operation: "create_log_dir".to_string(),
            cause: format!("{}: {e}", parent.display()),
        })?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::OperationFailed {
            operation: "open_log_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_log_file_created_with_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("infra.log");

        let mut file = open_log_file(&path).unwrap();
        file.write_all(b"cache connected\n").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "cache connected\n");
    }

    #[test]
    fn test_log_file_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("infra.log");
        std::fs::write(&path, "first\n").unwrap();

        let mut file = open_log_file(&path).unwrap();
        file.write_all(b"second\n").unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn test_log_file_under_regular_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();

        let err = open_log_file(&blocker.join("infra.log")).unwrap_err();

        assert!(matches!(err, Error::OperationFailed { .. }));
    }

    #[test]
    fn test_second_init_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = || LoggingConfig {
            format: LogFormat::Json,
            filter: tracing_subscriber::EnvFilter::new("info"),
            file: Some(dir.path().join("infra.log")),
        };

        // The first call may lose to another test in this binary; the second
        // always finds a subscriber installed.
        let _ = init(config());
        let err = init(config()).unwrap_err();

        match err {
            Error::OperationFailed { operation, .. } => {
                assert_eq!(operation, "observability_init");
            },
            other => panic!("unexpected error: {other}"),
        }
    }
}
