//! Binary entry point for wanderlust-infra.
//!
//! Connects the backend's database and cache the way the application process
//! does at startup, then stays up until interrupted.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for errors raised before logging exists
#![allow(clippy::print_stderr)]
#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use wanderlust_infra::config::{DeploymentProfile, InfraConfig};
use wanderlust_infra::observability;
use wanderlust_infra::services::Bootstrap;

/// Connects the Wanderlust backend's MongoDB and Redis dependencies.
#[derive(Parser)]
#[command(name = "wanderlust-infra")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, env = "WANDERLUST_CONFIG")]
    config: Option<PathBuf>,

    /// Deployment profile: compose or kubernetes.
    #[arg(short, long)]
    profile: Option<String>,

    /// Exit after initialization instead of waiting for Ctrl-C.
    #[arg(long)]
    once: bool,
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is not an error.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init_from_config(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize observability: {e}");
        return ExitCode::FAILURE;
    }

    match run(config, cli.once).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = format!("{e:#}"), "Fatal error");
            ExitCode::FAILURE
        },
    }
}

fn load_config(cli: &Cli) -> wanderlust_infra::Result<InfraConfig> {
    let profile = cli
        .profile
        .as_deref()
        .map(DeploymentProfile::parse)
        .transpose()?;
    InfraConfig::load(cli.config.as_deref(), profile)
}

async fn run(config: InfraConfig, once: bool) -> anyhow::Result<ExitCode> {
    let report = Bootstrap::new(config).run().await;
    if report.disposition.is_terminate() {
        return Ok(report.disposition.exit_code());
    }

    if wanderlust_infra::cache_handle().is_none() {
        tracing::warn!("Running without cache");
    }

    if once {
        return Ok(ExitCode::SUCCESS);
    }

    tracing::info!("Dependencies ready, press Ctrl-C to exit");
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutting down");
    Ok(ExitCode::SUCCESS)
}
