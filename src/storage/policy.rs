//! Per-dependency failure policies.
//!
//! Each dependency carries its own policy so the fatal / non-fatal split is a
//! named setting rather than branching at the call site:
//!
//! | Policy | Startup failure | Runtime error |
//! |--------|-----------------|---------------|
//! | `FailFast` | log, terminate the process | log |
//! | `DegradeGracefully` | log, keep running without the dependency | log |

use crate::Error;
use serde::Deserialize;
use std::process::ExitCode;

/// How a dependency's failures are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// A failed startup connection is fatal.
    FailFast,
    /// A failed startup connection leaves the process running degraded.
    #[serde(alias = "degrade")]
    DegradeGracefully,
}

/// What the process should do after startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposition {
    /// Keep running.
    #[default]
    Continue,
    /// Exit with a non-zero status.
    Terminate,
}

impl FailurePolicy {
    /// Returns the policy name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FailFast => "fail-fast",
            Self::DegradeGracefully => "degrade-gracefully",
        }
    }

    /// Logs a startup failure and decides whether the process survives it.
    pub fn on_startup_failure(self, service: &'static str, error: &Error) -> Disposition {
        metrics::counter!("connector_init_failed_total", "service" => service).increment(1);
        match self {
            Self::FailFast => {
                tracing::error!(
                    service,
                    policy = self.as_str(),
                    error = %error,
                    "Startup connection failed, terminating"
                );
                Disposition::Terminate
            },
            Self::DegradeGracefully => {
                tracing::error!(
                    service,
                    policy = self.as_str(),
                    error = %error,
                    "Startup connection failed, continuing without it"
                );
                Disposition::Continue
            },
        }
    }

    /// Logs an error raised after a successful connection. Never escalates.
    pub fn on_runtime_error(self, service: &'static str, message: &str) {
        tracing::error!(
            service,
            policy = self.as_str(),
            error = message,
            "Runtime connection error"
        );
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Disposition {
    /// Combines two dispositions; `Terminate` wins.
    #[must_use]
    pub const fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::Continue, Self::Continue) => Self::Continue,
            _ => Self::Terminate,
        }
    }

    /// Returns `true` if the process must exit.
    #[must_use]
    pub const fn is_terminate(self) -> bool {
        matches!(self, Self::Terminate)
    }

    /// Maps the disposition to a process exit status.
    #[must_use]
    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Continue => ExitCode::SUCCESS,
            Self::Terminate => ExitCode::FAILURE,
        }
    }
}
