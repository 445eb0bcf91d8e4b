// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use hpcops_core::domain::node_config::BackendConfigManifest;

pub const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");
pub const EXAMPLES_TEMPLATE: &str = include_str!("../../templates/config-with-examples.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path
        #[arg(short, long, default_value = "./hpcops-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, examples } => generate(output, examples),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    let config = BackendConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. HPCOPS_CONFIG_PATH: {}",
            std::env::var("HPCOPS_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./hpcops-config.yaml");
        println!("  4. ~/.hpcops/config.yaml");
        println!("  5. /etc/hpcops/config.yaml");
        println!();
    }

    if as_yaml {
        let yaml = serde_yaml::to_string(&config).context("Failed to render configuration")?;
        print!("{yaml}");
        return Ok(());
    }

    let spec = &config.spec;
    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Server:".bold());
    println!("  Listen: {}:{}", spec.server.bind_address, spec.server.port);
    println!("  Shutdown timeout: {}s", spec.server.shutdown_timeout_seconds);
    println!();

    println!("{}", "Clusters:".bold());
    if spec.clusters.is_empty() {
        println!("  {}", "(none configured)".yellow());
    }
    for cluster in &spec.clusters {
        println!("  {}", cluster.name.bold());
        println!("    Lustre server: {}", cluster.lustre_server);
        println!("    Slurm REST:    {}", cluster.slurmrestd);
    }
    println!();

    println!("{}", "Application store:".bold());
    match &spec.database {
        Some(db) => {
            println!("  PostgreSQL (max {} connections)", db.max_connections);
            println!("  Run migrations on start: {}", db.run_migrations);
        }
        None => println!("  {}", "in-memory (development only)".yellow()),
    }
    println!();

    println!("{}", "Gateway:".bold());
    println!("  Timeout: {}s", spec.gateway.timeout_seconds);
    println!("  Lookup concurrency: {}", spec.gateway.lookup_concurrency);
    println!();

    let logging = config.logging();
    println!("{}", "Logging:".bold());
    println!("  Level: {} ({})", logging.level, logging.format);

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = BackendConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    let sample = if with_examples {
        EXAMPLES_TEMPLATE
    } else {
        MINIMAL_TEMPLATE
    };

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_parse_and_validate() {
        for template in [MINIMAL_TEMPLATE, EXAMPLES_TEMPLATE] {
            let config = BackendConfigManifest::from_yaml_str(template).unwrap();
            config.validate().unwrap();
        }
    }

    #[test]
    fn test_examples_template_lists_clusters() {
        let config = BackendConfigManifest::from_yaml_str(EXAMPLES_TEMPLATE).unwrap();
        assert!(!config.spec.clusters.is_empty());
        assert!(config.spec.database.is_some());
    }

    #[test]
    fn test_generate_writes_template() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hpcops-config.yaml");

        generate(path.clone(), false).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, MINIMAL_TEMPLATE);
    }
}
