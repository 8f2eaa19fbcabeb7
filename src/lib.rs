//! # wanderlust-infra
//!
//! Startup connectors for the Wanderlust backend's external dependencies.
//!
//! The crate resolves connection parameters for the document store (MongoDB)
//! and the cache (Redis), opens one connection to each at process startup,
//! and publishes the live handles to the rest of the process.
//!
//! ## Failure handling
//!
//! The two dependencies are treated differently:
//!
//! - **Database**: failing to connect at startup is fatal ([`FailurePolicy::FailFast`]).
//! - **Cache**: failing to connect is logged and the process keeps running
//!   without it ([`FailurePolicy::DegradeGracefully`]). Callers of
//!   [`cache_handle`] must handle the absent case.
//!
//! ## Example
//!
//! ```rust,ignore
//! use wanderlust_infra::{InfraConfig, services::Bootstrap};
//!
//! let config = InfraConfig::from_env()?;
//! let report = Bootstrap::new(config).run().await;
//! if report.disposition.is_terminate() {
//!     std::process::exit(1);
//! }
//!
//! if let Some(cache) = wanderlust_infra::cache_handle() {
//!     cache.set("greeting", "hello").await?;
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod observability;
pub mod services;
pub mod storage;

pub use config::{CacheConfig, DatabaseConfig, DeploymentProfile, ExecutionMode, InfraConfig};
pub use storage::{
    CacheConnector, CacheHandle, ConnectorState, DatabaseConnector, DatabaseHandle, Disposition,
    FailurePolicy, InitOutcome, LinkState, ReconnectPolicy, cache_handle, database_handle,
    initialize_cache, initialize_database,
};

/// Error type for connector operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidConfig` | Unparseable port, unknown profile or mode, malformed config file |
/// | `Connection` | The initial connection to a dependency could not be established |
/// | `Disconnected` | A cache command was issued while the link is down |
/// | `Command` | A command reached the server but failed |
/// | `AlreadyInitialized` | A connector that already holds a handle is initialized again |
/// | `OperationFailed` | Local I/O or logging setup failures |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Configuration could not be resolved.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The initial connection attempt failed.
    ///
    /// `target` is the connection string with credentials redacted.
    #[error("{service} connection to {target} failed: {cause}")]
    Connection {
        /// Which dependency (`database` or `cache`).
        service: &'static str,
        /// Redacted connection string.
        target: String,
        /// The underlying cause.
        cause: String,
    },

    /// The link to the dependency is down and commands are rejected.
    ///
    /// There is no offline queue: commands issued while disconnected fail
    /// immediately instead of waiting for a reconnect.
    #[error("{service} is disconnected")]
    Disconnected {
        /// Which dependency.
        service: &'static str,
    },

    /// A command failed after being sent.
    #[error("command '{operation}' failed: {cause}")]
    Command {
        /// The command that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The connector already published a handle.
    #[error("{0} is already initialized")]
    AlreadyInitialized(&'static str),

    /// A local operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

/// Result type alias for connector operations.
pub type Result<T> = std::result::Result<T, Error>;
