//! MongoDB connector integration tests.
//!
//! These tests require a running MongoDB server. Set the environment variable
//! `WANDERLUST_TEST_MONGODB_URI` to enable them:
//!
//! ```bash
//! export WANDERLUST_TEST_MONGODB_URI="mongodb://localhost:27017/wanderlust_test"
//! cargo test --test mongodb_integration
//! ```

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::print_stderr
)]

use mongodb::bson::{Document, doc};
use std::env;
use std::sync::Arc;
use wanderlust_infra::config::{DatabaseConfig, DeploymentProfile, ExecutionMode};
use wanderlust_infra::{ConnectorState, DatabaseConnector, InitOutcome};

/// Environment variable for the MongoDB test connection URI.
const MONGODB_URI_ENV: &str = "WANDERLUST_TEST_MONGODB_URI";

fn get_mongodb_uri() -> Option<String> {
    env::var(MONGODB_URI_ENV).ok().filter(|v| !v.is_empty())
}

/// Skips the test when MongoDB is not available.
macro_rules! require_mongodb {
    () => {
        match get_mongodb_uri() {
            Some(uri) => uri,
            None => {
                eprintln!(
                    "Skipping test: {} not set. Set this environment variable to run MongoDB tests.",
                    MONGODB_URI_ENV
                );
                return;
            },
        }
    };
}

fn config(uri: &str) -> DatabaseConfig {
    DatabaseConfig::for_profile(DeploymentProfile::Compose).with_uri(uri)
}

#[tokio::test]
async fn test_connects_and_publishes_handle() {
    let uri = require_mongodb!();
    let connector = DatabaseConnector::new();

    let outcome = connector
        .initialize(&config(&uri), ExecutionMode::Normal)
        .await
        .unwrap();

    assert_eq!(outcome, InitOutcome::Connected);
    assert_eq!(connector.state(), ConnectorState::Connected);
    let handle = connector.get().expect("handle published");
    handle.ping().await.unwrap();
}

#[tokio::test]
async fn test_insert_and_find() {
    let uri = require_mongodb!();
    let connector = DatabaseConnector::new();
    connector
        .initialize(&config(&uri), ExecutionMode::Normal)
        .await
        .unwrap();
    let handle = connector.get().unwrap();
    let collection = handle
        .database()
        .collection::<Document>("infra_integration_listings");

    collection
        .insert_one(doc! { "title": "Cliffside cabin", "location": "Sintra" })
        .await
        .unwrap();
    let found = collection
        .find_one(doc! { "location": "Sintra" })
        .await
        .unwrap()
        .expect("document inserted");

    assert_eq!(found.get_str("title").unwrap(), "Cliffside cabin");
    collection.drop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readers_share_handle() {
    let uri = require_mongodb!();
    let connector = Arc::new(DatabaseConnector::new());
    connector
        .initialize(&config(&uri), ExecutionMode::Normal)
        .await
        .unwrap();
    let name = connector.get().unwrap().name().to_string();

    let readers: Vec<_> = (0..16)
        .map(|_| {
            let connector = Arc::clone(&connector);
            tokio::spawn(async move {
                let handle = connector.get().expect("handle visible to every reader");
                handle.ping().await.unwrap();
                handle.name().to_string()
            })
        })
        .collect();

    for reader in readers {
        assert_eq!(reader.await.unwrap(), name);
    }
}
