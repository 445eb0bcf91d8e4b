// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `hpcops serve` - run the HTTP API
//!
//! Wires configuration into clients, repositories and services, optionally
//! starts the Prometheus exporter, then serves until Ctrl+C or SIGTERM.

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use clap::Args;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::future::IntoFuture;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use hpcops_core::application::repository_factory::create_application_repository;
use hpcops_core::application::{
    QuotaAggregator, QuotaUpdateService, ReviewProcessor, StandardApplicationService,
};
use hpcops_core::domain::node_config::{BackendConfigManifest, MetricsConfig};
use hpcops_core::domain::quota_source::{ClusterResolver, IdentityProvider, QuotaSource};
use hpcops_core::domain::repository::{PostgresConfig, StorageBackend};
use hpcops_core::infrastructure::db::Database;
use hpcops_core::infrastructure::{IdentityClient, LustreClient, StaticClusterRegistry};
use hpcops_core::presentation::api::{router, AppState};

#[derive(Args)]
pub struct ServeCommand {
    /// Listen port (overrides spec.server.port)
    #[arg(long, env = "HPCOPS_PORT")]
    port: Option<u16>,

    /// Listen address (overrides spec.server.bind_address)
    #[arg(long, env = "HPCOPS_BIND_ADDRESS")]
    bind: Option<String>,
}

pub async fn execute(cmd: ServeCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = BackendConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;
    config
        .validate()
        .context("Configuration validation failed")?;

    info!(
        name = %config.metadata.name,
        clusters = config.spec.clusters.len(),
        "Configuration loaded"
    );

    let bind = cmd
        .bind
        .unwrap_or_else(|| config.spec.server.bind_address.clone());
    let port = cmd.port.unwrap_or(config.spec.server.port);

    if let Some(metrics) = config
        .spec
        .observability
        .as_ref()
        .and_then(|o| o.metrics.as_ref())
        .filter(|m| m.enabled)
    {
        start_metrics_exporter(metrics, &bind).await?;
    }

    let state = build_state(&config).await?;
    let app = router(state);

    let addr = format!("{}:{}", bind, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("API listening on {}", addr);

    let shutdown_started = Arc::new(Notify::new());
    let server = axum::serve(listener, app).with_graceful_shutdown({
        let shutdown_started = shutdown_started.clone();
        async move {
            shutdown_signal().await;
            shutdown_started.notify_one();
        }
    });

    let grace = Duration::from_secs(config.spec.server.shutdown_timeout_seconds);
    tokio::select! {
        result = server.into_future() => result.context("HTTP server failed")?,
        _ = async {
            shutdown_started.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(seconds = grace.as_secs(), "Shutdown timeout elapsed, abandoning in-flight requests");
        }
    }

    info!("Server stopped");
    Ok(())
}

/// Build every service behind the router from configuration.
pub async fn build_state(config: &BackendConfigManifest) -> Result<AppState> {
    let spec = &config.spec;
    let timeout = Duration::from_secs(spec.gateway.timeout_seconds);

    let clusters: Arc<dyn ClusterResolver> =
        Arc::new(StaticClusterRegistry::new(spec.clusters.clone()));
    let source: Arc<dyn QuotaSource> = Arc::new(
        LustreClient::new(timeout).context("Failed to create Lustre client")?,
    );
    let identity: Arc<dyn IdentityProvider> = Arc::new(
        IdentityClient::new(timeout).context("Failed to create identity client")?,
    );

    let (backend, pool) = match &spec.database {
        Some(db) => {
            let database = Database::new(&db.url, db.max_connections).await?;
            if db.run_migrations {
                info!("Applying database migrations");
                database.migrate().await?;
            }
            let backend = StorageBackend::PostgreSQL(PostgresConfig {
                connection_string: db.url.clone(),
                max_connections: db.max_connections,
            });
            (backend, Some(database.get_pool().clone()))
        }
        None => {
            warn!("No database configured; quota applications are kept in memory and lost on restart");
            (StorageBackend::InMemory, None)
        }
    };
    let repository = create_application_repository(&backend, pool);

    let concurrency = spec.gateway.lookup_concurrency;
    let aggregator = Arc::new(QuotaAggregator::new(
        source.clone(),
        identity,
        clusters.clone(),
        concurrency,
    ));

    Ok(AppState {
        aggregator: aggregator.clone(),
        quota_updates: Arc::new(QuotaUpdateService::new(source.clone(), clusters.clone())),
        applications: Arc::new(StandardApplicationService::new(
            repository.clone(),
            aggregator,
            concurrency,
        )),
        reviews: Arc::new(ReviewProcessor::new(repository, source, clusters.clone())),
        clusters,
        paging: spec.paging.clone(),
    })
}

async fn start_metrics_exporter(config: &MetricsConfig, bind: &str) -> Result<()> {
    if !config.path.starts_with('/') {
        anyhow::bail!("metrics path must start with '/': {}", config.path);
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;
    let app = Router::new().route(
        &config.path,
        get(move || std::future::ready(handle.render())),
    );

    let addr = format!("{}:{}", bind, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind metrics listener to {}", addr))?;
    info!("Metrics exposed on {}{}", addr, config.path);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Metrics listener failed");
        }
    });
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
