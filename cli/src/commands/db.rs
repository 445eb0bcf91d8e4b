// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Database Commands
//!
//! `hpcops db migrate` applies the application store schema shipped with
//! `hpcops-core`.
//!
//! # Usage
//!
//! ```bash
//! # Apply all pending migrations
//! hpcops db migrate
//!
//! # Preview migrations without applying
//! hpcops db migrate --dry-run
//! ```
//!
//! The database URL comes from `spec.database.url` or `HPCOPS_DATABASE_URL`.

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::collections::HashSet;
use std::path::PathBuf;

use hpcops_core::domain::node_config::BackendConfigManifest;
use hpcops_core::infrastructure::db::{Database, MIGRATOR};

#[derive(Subcommand)]
pub enum DbCommand {
    /// Apply pending schema migrations
    Migrate {
        /// List pending migrations without applying them
        #[arg(long)]
        dry_run: bool,
    },
}

pub async fn handle_command(command: DbCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        DbCommand::Migrate { dry_run } => migrate(config_override, dry_run).await,
    }
}

async fn migrate(config_override: Option<PathBuf>, dry_run: bool) -> Result<()> {
    println!("{}", "hpcops db migrate".bold().green());

    let config = BackendConfigManifest::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let db_config = config.spec.database.context(
        "No database configured. Set spec.database.url or HPCOPS_DATABASE_URL.",
    )?;

    println!("Connecting to database...");
    let database = Database::new(&db_config.url, 1).await?;

    // The migrations table does not exist before the first run.
    let applied: HashSet<i64> = sqlx::query_scalar::<_, i64>("SELECT version FROM _sqlx_migrations")
        .fetch_all(database.get_pool())
        .await
        .map(|versions| versions.into_iter().collect())
        .unwrap_or_default();

    let pending: Vec<_> = MIGRATOR
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .collect();

    println!(
        "Migration status: {} applied, {} total available.",
        applied.len(),
        MIGRATOR.iter().count()
    );

    if pending.is_empty() {
        println!("{}", "✓ Database is up to date.".green());
        return Ok(());
    }

    if dry_run {
        println!("Pending migrations found (Dry Run):");
        for migration in &pending {
            println!(" - {} {}", migration.version, migration.description);
        }
        println!("Skipping application due to --dry-run");
        return Ok(());
    }

    println!("Applying {} pending migration(s)...", pending.len());
    database.migrate().await?;
    println!("{}", "✓ Database updated successfully.".green());

    Ok(())
}
