//! Configuration management.
//!
//! Configuration is resolved once at startup from three layers, lowest to
//! highest precedence:
//!
//! 1. deployment-profile defaults ([`DeploymentProfile`]),
//! 2. an optional TOML file,
//! 3. environment variables,
//! 4. a profile chosen on the command line, which only replaces the
//!    profile; hosts set explicitly in the file or environment are kept.
//!
//! Resolution is a pure function of a [`ConfigFile`] and a key lookup, so it
//! can be exercised without touching the real process environment. An
//! environment variable set to the empty string counts as unset.

mod profile;

pub use profile::{DeploymentProfile, ExecutionMode};

use crate::storage::{FailurePolicy, ReconnectPolicy};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable names.
pub mod env {
    /// Database host.
    pub const MONGO_HOST: &str = "MONGO_HOST";
    /// Database port.
    pub const MONGO_PORT: &str = "MONGO_PORT";
    /// Database name.
    pub const MONGO_DB: &str = "MONGO_DB";
    /// Full database URI, used verbatim.
    pub const MONGODB_URI: &str = "MONGODB_URI";
    /// Cache host.
    pub const REDIS_HOST: &str = "REDIS_HOST";
    /// Cache port.
    pub const REDIS_PORT: &str = "REDIS_PORT";
    /// Full cache URL, used verbatim.
    pub const REDIS_URL: &str = "REDIS_URL";
    /// Enables or disables automatic cache reconnects.
    pub const REDIS_RECONNECT: &str = "REDIS_RECONNECT";
    /// Linear backoff step in milliseconds.
    pub const REDIS_RECONNECT_STEP_MS: &str = "REDIS_RECONNECT_STEP_MS";
    /// Backoff cap in milliseconds.
    pub const REDIS_RECONNECT_MAX_DELAY_MS: &str = "REDIS_RECONNECT_MAX_DELAY_MS";
    /// Idle link check interval in milliseconds; `0` disables it.
    pub const REDIS_HEALTH_CHECK_MS: &str = "REDIS_HEALTH_CHECK_MS";
    /// Deployment profile name.
    pub const DEPLOY_PROFILE: &str = "DEPLOY_PROFILE";
    /// Execution mode; `test` suppresses network I/O.
    pub const NODE_ENV: &str = "NODE_ENV";
    /// Alias for [`NODE_ENV`], consulted when it is unset.
    pub const APP_ENV: &str = "APP_ENV";
    /// Path to the TOML configuration file.
    pub const CONFIG_FILE: &str = "WANDERLUST_CONFIG";
    /// Log output format.
    pub const LOG_FORMAT: &str = "WANDERLUST_LOG_FORMAT";
    /// Log file path.
    pub const LOG_FILE: &str = "WANDERLUST_LOG_FILE";
    /// `tracing` filter directives.
    pub const LOG_FILTER: &str = "RUST_LOG";
}

/// Default database port.
pub const DEFAULT_DATABASE_PORT: u16 = 27017;
/// Default database name.
pub const DEFAULT_DATABASE_NAME: &str = "wanderlust";
/// Default cache port.
pub const DEFAULT_CACHE_PORT: u16 = 6379;
/// Default interval between idle cache link checks.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct InfraConfig {
    /// Deployment profile used for default hostnames.
    pub profile: DeploymentProfile,
    /// Execution mode.
    pub mode: ExecutionMode,
    /// Database settings.
    pub database: DatabaseConfig,
    /// Cache settings.
    pub cache: CacheConfig,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Database connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database name.
    pub name: String,
    /// Full URI override; takes precedence over host, port and name.
    pub uri_override: Option<String>,
    /// What to do when the initial connection fails.
    pub failure_policy: FailurePolicy,
}

impl DatabaseConfig {
    /// Creates settings with the defaults of the given profile.
    #[must_use]
    pub fn for_profile(profile: DeploymentProfile) -> Self {
        Self {
            host: profile.database_host().to_string(),
            port: DEFAULT_DATABASE_PORT,
            name: DEFAULT_DATABASE_NAME.to_string(),
            uri_override: None,
            failure_policy: FailurePolicy::FailFast,
        }
    }

    /// Returns the connection URI.
    ///
    /// The override is returned verbatim when present; otherwise the URI is
    /// `mongodb://{host}:{port}/{name}`.
    #[must_use]
    pub fn connection_uri(&self) -> String {
        self.uri_override.clone().unwrap_or_else(|| {
            format!("mongodb://{}:{}/{}", self.host, self.port, self.name)
        })
    }

    /// Sets the URI override.
    #[must_use]
    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri_override = Some(uri.into());
        self
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::for_profile(DeploymentProfile::default())
    }
}

/// Cache connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Cache host.
    pub host: String,
    /// Cache port.
    pub port: u16,
    /// Full URL override; takes precedence over host and port.
    pub url_override: Option<String>,
    /// Reconnect policy, `None` disables automatic reconnects.
    pub reconnect: Option<ReconnectPolicy>,
    /// How often an idle link is pinged, `None` disables the check.
    pub health_check: Option<Duration>,
    /// What to do when the initial connection fails.
    pub failure_policy: FailurePolicy,
}

impl CacheConfig {
    /// Creates settings with the defaults of the given profile.
    #[must_use]
    pub fn for_profile(profile: DeploymentProfile) -> Self {
        Self {
            host: profile.cache_host().to_string(),
            port: DEFAULT_CACHE_PORT,
            url_override: None,
            reconnect: Some(ReconnectPolicy::default()),
            health_check: Some(DEFAULT_HEALTH_CHECK_INTERVAL),
            failure_policy: FailurePolicy::DegradeGracefully,
        }
    }

    /// Returns the connection URL.
    ///
    /// The override is returned verbatim when present; otherwise the URL is
    /// `redis://{host}:{port}`.
    #[must_use]
    pub fn connection_url(&self) -> String {
        self.url_override
            .clone()
            .unwrap_or_else(|| format!("redis://{}:{}", self.host, self.port))
    }

    /// Sets the URL override.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url_override = Some(url.into());
        self
    }

    /// Sets or clears the reconnect policy.
    #[must_use]
    pub const fn with_reconnect(mut self, reconnect: Option<ReconnectPolicy>) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Sets or clears the idle link check interval.
    #[must_use]
    pub const fn with_health_check(mut self, interval: Option<Duration>) -> Self {
        self.health_check = interval;
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::for_profile(DeploymentProfile::default())
    }
}

/// Logging settings, consumed by [`crate::observability`].
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// `tracing` filter directives.
    pub filter: Option<String>,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Deployment profile name.
    pub profile: Option<String>,
    /// Execution mode name.
    pub mode: Option<String>,
    /// Database section.
    pub database: Option<ConfigFileDatabase>,
    /// Cache section.
    pub cache: Option<ConfigFileCache>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
}

/// Database section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileDatabase {
    /// Host.
    pub host: Option<String>,
    /// Port.
    pub port: Option<u16>,
    /// Database name.
    pub name: Option<String>,
    /// Full URI override.
    pub uri: Option<String>,
    /// Failure policy.
    pub on_failure: Option<FailurePolicy>,
}

/// Cache section in config file.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFileCache {
    /// Host.
    pub host: Option<String>,
    /// Port.
    pub port: Option<u16>,
    /// Full URL override.
    pub url: Option<String>,
    /// Enables automatic reconnects.
    pub reconnect: Option<bool>,
    /// Backoff step in milliseconds.
    pub reconnect_step_ms: Option<u64>,
    /// Backoff cap in milliseconds.
    pub reconnect_max_delay_ms: Option<u64>,
    /// Idle link check interval in milliseconds, `0` disables it.
    pub health_check_ms: Option<u64>,
    /// Failure policy.
    pub on_failure: Option<FailurePolicy>,
}

impl ConfigFile {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the document is malformed.
    pub fn parse(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Self::parse(&contents)
    }
}

impl InfraConfig {
    /// Resolves configuration from the process environment only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a variable has an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(process_env)
    }

    /// Resolves configuration from a key lookup only.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::resolve(ConfigFile::default(), lookup)
    }

    /// Loads configuration from an optional file plus the process environment.
    ///
    /// When `path` is `None`, `WANDERLUST_CONFIG` is consulted; with neither
    /// set only the environment and profile defaults apply. A `profile`
    /// given here wins over every other profile setting.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or any value is invalid.
    pub fn load(path: Option<&Path>, profile: Option<DeploymentProfile>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| process_env(env::CONFIG_FILE).map(PathBuf::from));
        let file = match path {
            Some(path) => ConfigFile::load(&path)?,
            None => ConfigFile::default(),
        };
        Self::resolve_with_profile(file, profile, process_env)
    }

    /// Merges a parsed file with environment lookups over profile defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a value is invalid.
    pub fn resolve<F>(file: ConfigFile, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::resolve_with_profile(file, None, lookup)
    }

    /// Like [`InfraConfig::resolve`], with `profile` taking precedence over
    /// `DEPLOY_PROFILE` and the file.
    ///
    /// The profile only supplies default hosts, so an explicit `MONGO_HOST`
    /// or `REDIS_HOST` survives it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a value is invalid.
    pub fn resolve_with_profile<F>(
        file: ConfigFile,
        profile: Option<DeploymentProfile>,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let profile = match (profile, get(env::DEPLOY_PROFILE).or(file.profile)) {
            (Some(profile), _) => profile,
            (None, Some(name)) => DeploymentProfile::parse(&name)?,
            (None, None) => DeploymentProfile::default(),
        };
        let mode = get(env::NODE_ENV)
            .or_else(|| get(env::APP_ENV))
            .or(file.mode)
            .map_or_else(ExecutionMode::default, |name| ExecutionMode::from_name(&name));

        let db_file = file.database.unwrap_or_default();
        let mut database = DatabaseConfig::for_profile(profile);
        if let Some(host) = get(env::MONGO_HOST).or(db_file.host) {
            database.host = host;
        }
        let file_db_port = file_port("database.port", db_file.port)?;
        if let Some(port) = env_port(&get, env::MONGO_PORT)?.or(file_db_port) {
            database.port = port;
        }
        if let Some(name) = get(env::MONGO_DB).or(db_file.name) {
            database.name = name;
        }
        database.uri_override = get(env::MONGODB_URI).or(db_file.uri);
        if let Some(policy) = db_file.on_failure {
            database.failure_policy = policy;
        }

        let cache_file = file.cache.unwrap_or_default();
        let mut cache = CacheConfig::for_profile(profile);
        cache.reconnect = resolve_reconnect(&get, &cache_file)?;
        cache.health_check = resolve_health_check(&get, &cache_file)?;
        if let Some(host) = get(env::REDIS_HOST).or(cache_file.host) {
            cache.host = host;
        }
        let file_cache_port = file_port("cache.port", cache_file.port)?;
        if let Some(port) = env_port(&get, env::REDIS_PORT)?.or(file_cache_port) {
            cache.port = port;
        }
        cache.url_override = get(env::REDIS_URL).or(cache_file.url);
        if let Some(policy) = cache_file.on_failure {
            cache.failure_policy = policy;
        }

        let mut logging = file.logging.unwrap_or_default();
        if let Some(format) = get(env::LOG_FORMAT) {
            logging.format = Some(format);
        }
        if let Some(filter) = get(env::LOG_FILTER) {
            logging.filter = Some(filter);
        }
        if let Some(file) = get(env::LOG_FILE) {
            logging.file = Some(PathBuf::from(file));
        }

        Ok(Self {
            profile,
            mode,
            database,
            cache,
            logging,
        })
    }

    /// Overrides the execution mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for InfraConfig {
    fn default() -> Self {
        let profile = DeploymentProfile::default();
        Self {
            profile,
            mode: ExecutionMode::default(),
            database: DatabaseConfig::for_profile(profile),
            cache: CacheConfig::for_profile(profile),
            logging: LoggingSettings::default(),
        }
    }
}

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_port<G>(get: &G, key: &str) -> Result<Option<u16>>
where
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|value| {
            value
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|port| *port != 0)
                .ok_or_else(|| {
                    Error::InvalidConfig(format!("{key} must be a port number, got '{value}'"))
                })
        })
        .transpose()
}

fn file_port(key: &str, port: Option<u16>) -> Result<Option<u16>> {
    match port {
        Some(0) => Err(Error::InvalidConfig(format!(
            "{key} must be a port number, got '0'"
        ))),
        port => Ok(port),
    }
}

fn env_millis<G>(get: &G, key: &str) -> Result<Option<u64>>
where
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|value| {
            value.trim().parse::<u64>().map_err(|_| {
                Error::InvalidConfig(format!("{key} must be milliseconds, got '{value}'"))
            })
        })
        .transpose()
}

fn env_bool<G>(get: &G, key: &str) -> Result<Option<bool>>
where
    G: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|value| match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::InvalidConfig(format!(
                "{key} must be true or false, got '{value}'"
            ))),
        })
        .transpose()
}

fn resolve_reconnect<G>(get: &G, file: &ConfigFileCache) -> Result<Option<ReconnectPolicy>>
where
    G: Fn(&str) -> Option<String>,
{
    let enabled = env_bool(get, env::REDIS_RECONNECT)?
        .or(file.reconnect)
        .unwrap_or(true);
    if !enabled {
        return Ok(None);
    }

    let mut policy = ReconnectPolicy::default();
    if let Some(step) = env_millis(get, env::REDIS_RECONNECT_STEP_MS)?.or(file.reconnect_step_ms) {
        policy = policy.with_step(Duration::from_millis(step));
    }
    if let Some(max) =
        env_millis(get, env::REDIS_RECONNECT_MAX_DELAY_MS)?.or(file.reconnect_max_delay_ms)
    {
        policy = policy.with_max_delay(Duration::from_millis(max));
    }
    Ok(Some(policy))
}

fn resolve_health_check<G>(get: &G, file: &ConfigFileCache) -> Result<Option<Duration>>
where
    G: Fn(&str) -> Option<String>,
{
    match env_millis(get, env::REDIS_HEALTH_CHECK_MS)?.or(file.health_check_ms) {
        Some(0) => Ok(None),
        Some(ms) => Ok(Some(Duration::from_millis(ms))),
        None => Ok(Some(DEFAULT_HEALTH_CHECK_INTERVAL)),
    }
}
