// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Picks the concrete [`ApplicationRepository`] for the configured storage
//! backend so the domain layer never names an implementation.

use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;

use crate::domain::repository::{ApplicationRepository, StorageBackend};
use crate::infrastructure::repositories::{
    InMemoryApplicationRepository, PostgresApplicationRepository,
};

/// Creates an ApplicationRepository for `backend`.
///
/// A PostgreSQL backend without a pool falls back to memory; this only
/// happens when the caller failed to connect and chose to keep serving.
pub fn create_application_repository(
    backend: &StorageBackend,
    pool: Option<PgPool>,
) -> Arc<dyn ApplicationRepository> {
    match (backend, pool) {
        (StorageBackend::PostgreSQL(_), Some(pool)) => {
            Arc::new(PostgresApplicationRepository::new(pool))
        }
        (StorageBackend::PostgreSQL(_), None) => {
            warn!("PostgreSQL backend configured without a pool, applications kept in memory");
            Arc::new(InMemoryApplicationRepository::new())
        }
        (StorageBackend::InMemory, _) => Arc::new(InMemoryApplicationRepository::new()),
    }
}
