// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contract for the [`Application`] aggregate, defined in the
//! domain layer and implemented in `crate::infrastructure::repositories`.
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `ApplicationRepository` | `Application` | `InMemoryApplicationRepository`, `PostgresApplicationRepository` |
//!
//! Every mutating operation treats "zero rows affected" as
//! [`RepositoryError::NotFound`], never as a silent success. Operations by id
//! are scoped to one [`ApplicationClass`]; a row of another class is
//! reported as not found.

use crate::domain::application::{
    Application, ApplicationClass, ApplicationId, NewApplication, ReviewOutcome,
};
use async_trait::async_trait;

/// Storage backend selected at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

/// Filter and window for [`ApplicationRepository::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationQuery {
    pub class: ApplicationClass,
    /// Only applied when non-empty.
    pub applier: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

impl ApplicationQuery {
    pub fn applier_filter(&self) -> Option<&str> {
        self.applier
            .as_deref()
            .map(str::trim)
            .filter(|applier| !applier.is_empty())
    }
}

/// Repository interface for Application aggregates.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Insert in state `REVIEWING` with `apply_at = now`. Content must not be
    /// empty.
    async fn create(&self, application: &NewApplication) -> Result<ApplicationId, RepositoryError>;

    async fn find_by_id(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError>;

    /// One page of applications ordered by `(state DESC, apply_at DESC)`,
    /// plus the total number of rows matching the filter.
    async fn list(&self, query: &ApplicationQuery) -> Result<(Vec<Application>, i64), RepositoryError>;

    /// Replace content and restart the review cycle: state back to
    /// `REVIEWING`, `apply_at = now`, reviewer/review time/decision cleared.
    async fn update_content(
        &self,
        class: ApplicationClass,
        id: ApplicationId,
        content: &serde_json::Value,
    ) -> Result<(), RepositoryError>;

    async fn delete(&self, class: ApplicationClass, id: ApplicationId) -> Result<(), RepositoryError>;

    /// Decision text of an application; empty if not yet reviewed.
    async fn decision(&self, class: ApplicationClass, id: ApplicationId) -> Result<String, RepositoryError>;

    /// Record a review outcome and set `review_at = now`.
    ///
    /// Only applies while the application is `REVIEWING`. Fails with
    /// `NotFound` for an unknown id and `Conflict` when the application has
    /// already left `REVIEWING`.
    async fn review(
        &self,
        class: ApplicationClass,
        id: ApplicationId,
        outcome: &ReviewOutcome,
    ) -> Result<(), RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

/// Content check shared by all implementations.
pub fn ensure_content(content: &serde_json::Value) -> Result<(), RepositoryError> {
    let empty = match content {
        serde_json::Value::Null => true,
        serde_json::Value::String(s) => s.trim().is_empty(),
        serde_json::Value::Object(map) => map.is_empty(),
        _ => false,
    };
    if empty {
        return Err(RepositoryError::Serialization(
            "application content must not be empty".to_string(),
        ));
    }
    Ok(())
}
