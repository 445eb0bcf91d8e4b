// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Backend Configuration Types
//
// Defines the configuration schema for the HPC operations backend:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Per-cluster backend service addresses
// - Application store selection (PostgreSQL or in-memory)
// - Gateway timeouts, paging limits, logging and metrics

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub const API_VERSION: &str = "hpcops/v1";
pub const KIND: &str = "BackendConfig";

/// Top-level Kubernetes-style backend configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfigManifest {
    /// API version (must be "hpcops/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "BackendConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: BackendConfigSpec,
}

/// Manifest metadata (Kubernetes-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendConfigSpec {
    #[serde(default)]
    pub server: ServerConfig,

    /// Clusters served by this backend
    #[serde(default)]
    pub clusters: Vec<ClusterConfig>,

    /// Application store. Absent means in-memory (development only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,

    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub paging: PagingConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observability: Option<ObservabilityConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_api_port")]
    pub port: u16,

    /// Seconds to wait for in-flight requests on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

/// Backend service addresses (`host:port`) of one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub name: String,

    /// Lustre command-execution service
    pub lustre_server: String,

    /// Slurm REST gateway, which also fronts the LDAP user directory
    pub slurmrestd: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Apply pending migrations on startup
    #[serde(default)]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Per-request timeout for backend service calls
    #[serde(default = "default_gateway_timeout")]
    pub timeout_seconds: u64,

    /// Maximum concurrent per-user quota lookups within one request
    #[serde(default = "default_lookup_concurrency")]
    pub lookup_concurrency: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagingConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: i64,

    #[serde(default = "default_max_page_size")]
    pub max_page_size: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, text)
    #[serde(default = "default_log_format")]
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_metrics_port")]
    pub port: u16,

    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8081
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_max_connections() -> u32 {
    5
}

fn default_gateway_timeout() -> u64 {
    5
}

fn default_lookup_concurrency() -> usize {
    8
}

fn default_page_size() -> i64 {
    20
}

fn default_max_page_size() -> i64 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_metrics_port() -> u16 {
    9091
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_gateway_timeout(),
            lookup_concurrency: default_lookup_concurrency(),
        }
    }
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for BackendConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "hpcops-backend".to_string(),
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: BackendConfigSpec::default(),
        }
    }
}

impl BackendConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. HPCOPS_CONFIG_PATH environment variable
    /// 2. ./hpcops-config.yaml (working directory)
    /// 3. ~/.hpcops/config.yaml (user home)
    /// 4. /etc/hpcops/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("HPCOPS_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./hpcops-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".hpcops").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/hpcops/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("HPCOPS_DATABASE_URL") {
            if !url.trim().is_empty() {
                tracing::info!("Environment override: HPCOPS_DATABASE_URL");
                match self.spec.database.as_mut() {
                    Some(db) => db.url = url,
                    None => {
                        self.spec.database = Some(DatabaseConfig {
                            url,
                            max_connections: default_max_connections(),
                            run_migrations: false,
                        })
                    }
                }
            }
        }

        if let Ok(level) = std::env::var("HPCOPS_LOG_LEVEL") {
            if !level.trim().is_empty() {
                tracing::info!("Environment override: HPCOPS_LOG_LEVEL={}", level);
                self.spec
                    .observability
                    .get_or_insert_with(ObservabilityConfig::default)
                    .logging
                    .level = level;
            }
        }
    }

    pub fn cluster(&self, name: &str) -> Option<&ClusterConfig> {
        self.spec.clusters.iter().find(|c| c.name == name)
    }

    pub fn logging(&self) -> LoggingConfig {
        self.spec
            .observability
            .as_ref()
            .map(|o| o.logging.clone())
            .unwrap_or_default()
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let mut seen = HashSet::new();
        for cluster in &self.spec.clusters {
            if cluster.name.trim().is_empty() {
                anyhow::bail!("Cluster name cannot be empty");
            }
            if !seen.insert(cluster.name.as_str()) {
                anyhow::bail!("Duplicate cluster name: {}", cluster.name);
            }
            if cluster.lustre_server.trim().is_empty() {
                anyhow::bail!("lustre_server cannot be empty for cluster: {}", cluster.name);
            }
            if cluster.slurmrestd.trim().is_empty() {
                anyhow::bail!("slurmrestd cannot be empty for cluster: {}", cluster.name);
            }
        }

        if let Some(db) = &self.spec.database {
            if db.url.trim().is_empty() {
                anyhow::bail!("spec.database.url cannot be empty");
            }
            if db.max_connections == 0 {
                anyhow::bail!("spec.database.max_connections must be greater than zero");
            }
        }

        if self.spec.gateway.lookup_concurrency == 0 {
            anyhow::bail!("spec.gateway.lookup_concurrency must be greater than zero");
        }

        let paging = &self.spec.paging;
        if paging.default_page_size <= 0 || paging.max_page_size <= 0 {
            anyhow::bail!("spec.paging page sizes must be greater than zero");
        }
        if paging.default_page_size > paging.max_page_size {
            anyhow::bail!(
                "spec.paging.default_page_size ({}) exceeds max_page_size ({})",
                paging.default_page_size,
                paging.max_page_size
            );
        }

        let format = self.logging().format;
        if format != "json" && format != "text" {
            anyhow::bail!("Invalid logging format: '{}'. Must be 'json' or 'text'", format);
        }

        Ok(())
    }
}
