//! Startup sequence for the backend's external dependencies.

use crate::config::InfraConfig;
use crate::storage::{
    CacheConnector, ConnectorState, DatabaseConnector, Disposition, FailurePolicy, InitOutcome,
    cache, database,
};
use crate::{Error, Result};

/// Outcome of a bootstrap run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Database connector state after the run.
    pub database: ConnectorState,
    /// Cache connector state after the run.
    pub cache: ConnectorState,
    /// Whether the process may keep running.
    pub disposition: Disposition,
}

/// Runs both connectors and applies each dependency's failure policy.
pub struct Bootstrap<'a> {
    config: InfraConfig,
    database: &'a DatabaseConnector,
    cache: &'a CacheConnector,
}

impl Bootstrap<'static> {
    /// Creates a bootstrap over the process-wide connectors.
    #[must_use]
    pub fn new(config: InfraConfig) -> Self {
        Self::with_connectors(config, database::global(), cache::global())
    }
}

impl<'a> Bootstrap<'a> {
    /// Creates a bootstrap over caller-owned connectors.
    #[must_use]
    pub const fn with_connectors(
        config: InfraConfig,
        database: &'a DatabaseConnector,
        cache: &'a CacheConnector,
    ) -> Self {
        Self {
            config,
            database,
            cache,
        }
    }

    /// Returns the configuration in use.
    #[must_use]
    pub const fn config(&self) -> &InfraConfig {
        &self.config
    }

    /// Initializes the database and cache concurrently.
    ///
    /// Failures are logged through the dependency's [`FailurePolicy`]; the
    /// report's disposition is `Terminate` if any policy demands it.
    pub async fn run(&self) -> BootstrapReport {
        let mode = self.config.mode;
        tracing::info!(
            profile = %self.config.profile,
            mode = ?mode,
            "Initializing external dependencies"
        );

        let (database, cache) = tokio::join!(
            self.database.initialize(&self.config.database, mode),
            self.cache.initialize(&self.config.cache, mode),
        );

        let disposition = settle("database", self.config.database.failure_policy, database)
            .and(settle("cache", self.config.cache.failure_policy, cache));

        let report = BootstrapReport {
            database: self.database.state(),
            cache: self.cache.state(),
            disposition,
        };
        tracing::info!(
            database = %report.database,
            cache = %report.cache,
            disposition = ?report.disposition,
            "Dependency initialization finished"
        );
        report
    }
}

fn settle(
    service: &'static str,
    policy: FailurePolicy,
    result: Result<InitOutcome>,
) -> Disposition {
    match result {
        Ok(_) => Disposition::Continue,
        Err(e @ Error::AlreadyInitialized(_)) => {
            tracing::warn!(service, error = %e, "Connector was initialized elsewhere");
            Disposition::Continue
        },
        Err(e) => policy.on_startup_failure(service, &e),
    }
}
