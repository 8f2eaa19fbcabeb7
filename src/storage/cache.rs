//! Redis connector.
//!
//! Opens one multiplexed connection at startup and publishes a
//! [`CacheHandle`]. The handle keeps the same identity for the life of the
//! process; when the link drops it swaps in a fresh connection from a
//! background reconnect task.
//!
//! # Disconnected commands
//!
//! There is no offline queue. While the link is down every command fails
//! with [`Error::Disconnected`] straight away instead of waiting for the
//! reconnect to finish.
//!
//! # Reconnects
//!
//! A command that fails with an I/O or dropped-connection error marks the
//! link down and, if a [`ReconnectPolicy`] is configured, starts one
//! reconnect task. The task sleeps `policy.delay(attempts)` before each try
//! (attempts counted from zero), and stops once the link is back or every
//! handle clone has been dropped.
//!
//! # Idle links
//!
//! A link that drops while nobody is sending commands is found by a health
//! check task that sends `PING` every `CacheConfig::health_check` interval.
//! A failed ping is handled exactly like a failed command.

use super::InitOutcome;
use super::policy::FailurePolicy;
use super::reconnect::ReconnectPolicy;
use super::redact::redact_credentials;
use super::state::{ConnectorState, StateCell};
use crate::config::{CacheConfig, ExecutionMode};
use crate::{Error, Result};
use redis::aio::MultiplexedConnection;
use redis::{Client, Cmd, FromRedisValue, RedisError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

const SERVICE: &str = "cache";

/// State of the link behind a [`CacheHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Commands are sent to the server.
    Connected,
    /// The link dropped and a reconnect task is running.
    Reconnecting,
    /// The link dropped and reconnects are disabled.
    Down,
}

struct Link {
    generation: u64,
    connection: Option<MultiplexedConnection>,
}

struct Shared {
    client: Client,
    target: String,
    reconnect: Option<ReconnectPolicy>,
    failure_policy: FailurePolicy,
    link: RwLock<Link>,
    reconnecting: AtomicBool,
}

// The link is a plain value that is never left half-written, so a poisoned
// lock still holds a usable state.
impl Shared {
    fn read_link(&self) -> RwLockReadGuard<'_, Link> {
        self.link.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_link(&self) -> RwLockWriteGuard<'_, Link> {
        self.link.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn current(&self) -> Option<(u64, MultiplexedConnection)> {
        let link = self.read_link();
        link.connection
            .as_ref()
            .map(|connection| (link.generation, connection.clone()))
    }

    fn install(&self, connection: MultiplexedConnection) {
        let mut link = self.write_link();
        link.generation = link.generation.wrapping_add(1);
        link.connection = Some(connection);
    }

    /// Drops the connection of `generation` and starts reconnecting.
    ///
    /// A stale generation means another caller already handled the drop.
    fn link_lost(self: &Arc<Self>, generation: u64, message: &str) {
        {
            let mut link = self.write_link();
            if link.generation != generation || link.connection.is_none() {
                return;
            }
            link.connection = None;
        }

        self.failure_policy.on_runtime_error(SERVICE, message);

        match self.reconnect {
            Some(policy) => spawn_reconnect(self, policy),
            None => tracing::warn!(
                service = SERVICE,
                target = %self.target,
                "Cache link lost and reconnect is disabled"
            ),
        }
    }
}

/// Live cache handle.
///
/// Cloning is cheap; all clones share the same link.
#[derive(Clone)]
pub struct CacheHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for CacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheHandle")
            .field("target", &self.shared.target)
            .field("link", &self.link_state())
            .field("reconnect", &self.shared.reconnect)
            .finish()
    }
}

impl CacheHandle {
    fn new(
        client: Client,
        target: String,
        reconnect: Option<ReconnectPolicy>,
        failure_policy: FailurePolicy,
        connection: Option<MultiplexedConnection>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                client,
                target,
                reconnect,
                failure_policy,
                link: RwLock::new(Link {
                    generation: 0,
                    connection,
                }),
                reconnecting: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the redacted connection URL.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.shared.target
    }

    /// Returns the current link state.
    #[must_use]
    pub fn link_state(&self) -> LinkState {
        if self.shared.read_link().connection.is_some() {
            LinkState::Connected
        } else if self.shared.reconnecting.load(Ordering::Acquire) {
            LinkState::Reconnecting
        } else {
            LinkState::Down
        }
    }

    /// Returns `true` if commands are currently accepted.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.link_state() == LinkState::Connected
    }

    /// Runs an arbitrary command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disconnected`] while the link is down and
    /// [`Error::Command`] if the command fails.
    pub async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T> {
        self.run("query", cmd).await
    }

    /// Sends `PING`.
    ///
    /// # Errors
    ///
    /// See [`CacheHandle::query`].
    pub async fn ping(&self) -> Result<()> {
        let _pong: String = self.run("PING", &redis::cmd("PING")).await?;
        Ok(())
    }

    /// Reads a string value.
    ///
    /// # Errors
    ///
    /// See [`CacheHandle::query`].
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.run("GET", &cmd).await
    }

    /// Writes a string value.
    ///
    /// # Errors
    ///
    /// See [`CacheHandle::query`].
    pub async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        self.run("SET", &cmd).await
    }

    /// Deletes a key, returning whether it existed.
    ///
    /// # Errors
    ///
    /// See [`CacheHandle::query`].
    pub async fn del(&self, key: &str) -> Result<bool> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        let removed: u64 = self.run("DEL", &cmd).await?;
        Ok(removed > 0)
    }

    async fn run<T: FromRedisValue>(&self, operation: &str, cmd: &Cmd) -> Result<T> {
        let (generation, mut connection) = self.connection()?;
        match cmd.query_async(&mut connection).await {
            Ok(value) => Ok(value),
            Err(e) => {
                if is_link_failure(&e) {
                    self.shared.link_lost(generation, &e.to_string());
                }
                Err(Error::Command {
                    operation: operation.to_string(),
                    cause: e.to_string(),
                })
            },
        }
    }

    fn connection(&self) -> Result<(u64, MultiplexedConnection)> {
        self.shared.current().ok_or_else(|| {
            metrics::counter!("cache_commands_rejected_total").increment(1);
            Error::Disconnected { service: SERVICE }
        })
    }
}

fn is_link_failure(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_dropped()
}

async fn open_connection(client: &Client) -> redis::RedisResult<MultiplexedConnection> {
    let mut connection = client.get_multiplexed_async_connection().await?;
    let _pong: String = redis::cmd("PING").query_async(&mut connection).await?;
    Ok(connection)
}

fn spawn_reconnect(shared: &Arc<Shared>, policy: ReconnectPolicy) {
    if shared.reconnecting.swap(true, Ordering::AcqRel) {
        return;
    }

    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        shared.reconnecting.store(false, Ordering::Release);
        tracing::error!(
            service = SERVICE,
            "No async runtime available, cannot reconnect cache"
        );
        return;
    };

    tracing::info!(service = SERVICE, target = %shared.target, "Cache reconnecting");
    runtime.spawn(reconnect_loop(Arc::downgrade(shared), policy));
}

fn spawn_health_check(shared: &Arc<Shared>, interval: Duration) {
    if interval.is_zero() {
        return;
    }
    tokio::spawn(health_check_loop(Arc::downgrade(shared), interval));
}

async fn health_check_loop(weak: Weak<Shared>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let Some(shared) = weak.upgrade() else {
            tracing::debug!(service = SERVICE, "Cache handle dropped, stopping health check");
            return;
        };
        let Some((generation, mut connection)) = shared.current() else {
            continue;
        };

        let pong: redis::RedisResult<String> =
            redis::cmd("PING").query_async(&mut connection).await;
        match pong {
            Ok(_) => {},
            Err(e) if is_link_failure(&e) => shared.link_lost(generation, &e.to_string()),
            Err(e) => shared.failure_policy.on_runtime_error(SERVICE, &e.to_string()),
        }
    }
}

async fn reconnect_loop(weak: Weak<Shared>, policy: ReconnectPolicy) {
    let mut attempts: u32 = 0;
    loop {
        let delay = policy.delay(attempts);
        tokio::time::sleep(delay).await;

        let Some(shared) = weak.upgrade() else {
            tracing::debug!(service = SERVICE, "Cache handle dropped, stopping reconnect");
            return;
        };

        metrics::counter!("cache_reconnect_attempts_total").increment(1);
        match open_connection(&shared.client).await {
            Ok(connection) => {
                shared.install(connection);
                shared.reconnecting.store(false, Ordering::Release);
                metrics::counter!("cache_reconnect_success_total").increment(1);
                tracing::info!(
                    service = SERVICE,
                    target = %shared.target,
                    attempts,
                    "Cache connected"
                );
                return;
            },
            Err(e) => {
                tracing::warn!(
                    service = SERVICE,
                    target = %shared.target,
                    attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Cache reconnect attempt failed"
                );
            },
        }
        attempts = attempts.saturating_add(1);
    }
}

/// Owns the one-time cache handle slot.
#[derive(Debug)]
pub struct CacheConnector {
    state: StateCell,
    handle: OnceLock<CacheHandle>,
}

impl CacheConnector {
    /// Creates an uninitialized connector.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: StateCell::new(),
            handle: OnceLock::new(),
        }
    }

    /// Returns the connector state.
    #[must_use]
    pub fn state(&self) -> ConnectorState {
        self.state.get()
    }

    /// Returns the handle, or `None` before a successful connection.
    ///
    /// An absent handle is an expected state: the cache is optional and
    /// callers must be able to run without it.
    #[must_use]
    pub fn get(&self) -> Option<CacheHandle> {
        self.handle.get().cloned()
    }

    /// Connects to the cache once.
    ///
    /// In test mode nothing is attempted and [`InitOutcome::Skipped`] is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the URL is invalid or the server is
    /// unreachable, and [`Error::AlreadyInitialized`] if a handle already
    /// exists or another attempt is in flight.
    pub async fn initialize(&self, config: &CacheConfig, mode: ExecutionMode) -> Result<InitOutcome> {
        if mode.skips_network() {
            tracing::info!(service = SERVICE, "Skipping cache connection in test mode");
            if self.state.get() == ConnectorState::Uninitialized {
                self.state.set(ConnectorState::Skipped);
            }
            return Ok(InitOutcome::Skipped);
        }

        self.state
            .begin_connecting()
            .map_err(|_| Error::AlreadyInitialized(SERVICE))?;
        metrics::counter!("connector_init_total", "service" => SERVICE).increment(1);

        let url = config.connection_url();
        let target = redact_credentials(&url);
        tracing::debug!(service = SERVICE, target = %target, "Connecting to cache");

        let connected = async {
            let client = Client::open(url.as_str())
                .map_err(|e| format!("invalid connection url: {e}"))?;
            let connection = open_connection(&client).await.map_err(|e| e.to_string())?;
            Ok::<_, String>((client, connection))
        }
        .await;

        match connected {
            Ok((client, connection)) => {
                let handle = CacheHandle::new(
                    client,
                    target.clone(),
                    config.reconnect,
                    config.failure_policy,
                    Some(connection),
                );
                let shared = Arc::clone(&handle.shared);
                self.publish(handle)?;
                if let Some(interval) = config.health_check {
                    spawn_health_check(&shared, interval);
                }
                tracing::info!(service = SERVICE, target = %target, "Cache connected");
                Ok(InitOutcome::Connected)
            },
            Err(cause) => {
                self.state.set(ConnectorState::Failed);
                Err(Error::Connection {
                    service: SERVICE,
                    target,
                    cause,
                })
            },
        }
    }

    fn publish(&self, handle: CacheHandle) -> Result<()> {
        let published = self.handle.set(handle).is_ok();
        self.state.set(ConnectorState::Connected);
        if published {
            Ok(())
        } else {
            Err(Error::AlreadyInitialized(SERVICE))
        }
    }
}

impl Default for CacheConnector {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_CACHE: CacheConnector = CacheConnector::new();

/// Returns the process-wide cache connector.
#[must_use]
pub fn global() -> &'static CacheConnector {
    &GLOBAL_CACHE
}

/// Initializes the process-wide cache connector.
///
/// # Errors
///
/// See [`CacheConnector::initialize`].
pub async fn initialize_cache(config: &CacheConfig, mode: ExecutionMode) -> Result<InitOutcome> {
    GLOBAL_CACHE.initialize(config, mode).await
}

/// Returns the process-wide cache handle, if connected.
#[must_use]
pub fn cache_handle() -> Option<CacheHandle> {
    GLOBAL_CACHE.get()
}
