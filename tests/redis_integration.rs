//! Redis connector integration tests.
//!
//! These tests require a running Redis server. Set the environment variable
//! `WANDERLUST_TEST_REDIS_URL` to enable them:
//!
//! ```bash
//! export WANDERLUST_TEST_REDIS_URL="redis://localhost:6379"
//! cargo test --test redis_integration
//! ```

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::print_stderr
)]

use std::env;
use std::sync::Arc;
use wanderlust_infra::config::{CacheConfig, DeploymentProfile, ExecutionMode};
use wanderlust_infra::{CacheConnector, ConnectorState, InitOutcome, LinkState};

/// Environment variable for the Redis test connection URL.
const REDIS_URL_ENV: &str = "WANDERLUST_TEST_REDIS_URL";

fn get_redis_url() -> Option<String> {
    env::var(REDIS_URL_ENV).ok().filter(|v| !v.is_empty())
}

/// Skips the test when Redis is not available.
macro_rules! require_redis {
    () => {
        match get_redis_url() {
            Some(url) => url,
            None => {
                eprintln!(
                    "Skipping test: {} not set. Set this environment variable to run Redis tests.",
                    REDIS_URL_ENV
                );
                return;
            },
        }
    };
}

fn config(url: &str) -> CacheConfig {
    CacheConfig::for_profile(DeploymentProfile::Compose).with_url(url)
}

fn unique_key(label: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("wanderlust:test:{label}:{nanos}")
}

#[tokio::test]
async fn test_connects_and_publishes_handle() {
    let url = require_redis!();
    let connector = CacheConnector::new();

    let outcome = connector
        .initialize(&config(&url), ExecutionMode::Normal)
        .await
        .unwrap();

    assert_eq!(outcome, InitOutcome::Connected);
    assert_eq!(connector.state(), ConnectorState::Connected);
    let handle = connector.get().expect("handle published");
    assert_eq!(handle.link_state(), LinkState::Connected);
    handle.ping().await.unwrap();
}

#[tokio::test]
async fn test_set_get_del() {
    let url = require_redis!();
    let connector = CacheConnector::new();
    connector
        .initialize(&config(&url), ExecutionMode::Normal)
        .await
        .unwrap();
    let handle = connector.get().unwrap();
    let key = unique_key("roundtrip");

    handle.set(&key, "lisbon").await.unwrap();
    assert_eq!(handle.get(&key).await.unwrap().as_deref(), Some("lisbon"));

    assert!(handle.del(&key).await.unwrap());
    assert_eq!(handle.get(&key).await.unwrap(), None);
    assert!(!handle.del(&key).await.unwrap());
}

#[tokio::test]
async fn test_raw_query() {
    let url = require_redis!();
    let connector = CacheConnector::new();
    connector
        .initialize(&config(&url), ExecutionMode::Normal)
        .await
        .unwrap();
    let handle = connector.get().unwrap();
    let key = unique_key("counter");

    let first: i64 = handle.query(redis::cmd("INCR").arg(&key)).await.unwrap();
    let second: i64 = handle.query(redis::cmd("INCR").arg(&key)).await.unwrap();

    assert_eq!(first, 1);
    assert_eq!(second, 2);
    handle.del(&key).await.unwrap();
}

#[tokio::test]
async fn test_second_initialize_keeps_first_handle() {
    let url = require_redis!();
    let connector = CacheConnector::new();
    connector
        .initialize(&config(&url), ExecutionMode::Normal)
        .await
        .unwrap();
    let first = connector.get().unwrap();

    let err = connector
        .initialize(&config(&url), ExecutionMode::Normal)
        .await
        .unwrap_err();

    assert!(err.to_string().contains("already initialized"));
    assert_eq!(connector.get().unwrap().target(), first.target());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readers_share_handle() {
    let url = require_redis!();
    let connector = Arc::new(CacheConnector::new());
    connector
        .initialize(&config(&url), ExecutionMode::Normal)
        .await
        .unwrap();
    let key = unique_key("shared");
    connector.get().unwrap().set(&key, "porto").await.unwrap();

    let readers: Vec<_> = (0..16)
        .map(|_| {
            let connector = Arc::clone(&connector);
            let key = key.clone();
            tokio::spawn(async move {
                let handle = connector.get().expect("handle visible to every reader");
                handle.get(&key).await.unwrap()
            })
        })
        .collect();

    for reader in readers {
        assert_eq!(reader.await.unwrap().as_deref(), Some("porto"));
    }
    connector.get().unwrap().del(&key).await.unwrap();
}
