//! Connectors for the external stores.
//!
//! - **Database**: MongoDB, fatal on startup failure by default.
//! - **Cache**: Redis, optional; the process keeps running without it.
//!
//! Each connector owns a one-time slot for its handle. The binary uses the
//! process-wide connectors behind [`initialize_database`] /
//! [`database_handle`] and [`initialize_cache`] / [`cache_handle`]; library
//! users can own [`DatabaseConnector`] and [`CacheConnector`] values instead
//! and pass them around explicitly.

pub mod cache;
pub mod database;
pub mod policy;
pub mod reconnect;
pub mod redact;
pub mod state;

pub use cache::{CacheConnector, CacheHandle, LinkState, cache_handle};
pub use database::{DatabaseConnector, DatabaseHandle, database_handle};
pub use policy::{Disposition, FailurePolicy};
pub use reconnect::ReconnectPolicy;
pub use redact::redact_credentials;
pub use state::ConnectorState;

use crate::Result;
use crate::config::InfraConfig;

/// Result of a successful `initialize` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// A handle was published.
    Connected,
    /// Test mode; nothing was attempted.
    Skipped,
}

/// Initializes the process-wide database connector from `config`.
///
/// # Errors
///
/// See [`DatabaseConnector::initialize`].
pub async fn initialize_database(config: &InfraConfig) -> Result<InitOutcome> {
    database::initialize_database(&config.database, config.mode).await
}

/// Initializes the process-wide cache connector from `config`.
///
/// # Errors
///
/// See [`CacheConnector::initialize`].
pub async fn initialize_cache(config: &InfraConfig) -> Result<InitOutcome> {
    cache::initialize_cache(&config.cache, config.mode).await
}
