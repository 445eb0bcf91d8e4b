// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # HPC Operations Backend
//!
//! The `hpcops` binary serves the Lustre quota API and carries the
//! administration commands around it.
//!
//! ## Commands
//!
//! - `hpcops serve` - Run the HTTP API
//! - `hpcops config show|validate|generate` - Configuration management
//! - `hpcops db migrate [--dry-run]` - Apply the application store schema

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use hpcops_cli::commands::{self, ConfigCommand, DbCommand, ServeCommand};
use hpcops_core::domain::node_config::BackendConfigManifest;

/// HPC operations backend
#[derive(Parser)]
#[command(name = "hpcops")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "HPCOPS_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    #[command(name = "serve")]
    Serve {
        #[command(flatten)]
        command: ServeCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Application store schema management
    #[command(name = "db")]
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logging settings come from the config file, so read it leniently first.
    let logging = BackendConfigManifest::load_or_default(cli.config.clone())
        .map(|c| c.logging())
        .unwrap_or_default();
    let level = cli.log_level.as_deref().unwrap_or(&logging.level);
    init_logging(level, &logging.format)?;

    match cli.command {
        Commands::Serve { command } => commands::serve::execute(command, cli.config).await,
        Commands::Config { command } => commands::config::handle_command(command, cli.config).await,
        Commands::Db { command } => commands::db::handle_command(command, cli.config).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, format: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if format.eq_ignore_ascii_case("json") {
        builder.json().with_current_span(false).init();
    } else {
        builder.with_target(false).compact().init();
    }

    Ok(())
}
