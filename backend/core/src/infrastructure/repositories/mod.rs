// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository contract defined in
//! `crate::domain::repository`.
//!
//! # Available Implementations
//!
//! - **PostgresApplicationRepository** - production store over the shared
//!   `applications` table
//! - **InMemoryApplicationRepository** - map-backed store for development
//!   and tests, with the same ordering and state rules

pub mod postgres_application;

pub use postgres_application::PostgresApplicationRepository;

use crate::domain::application::{
    Application, ApplicationClass, ApplicationId, ApplicationState, NewApplication, ReviewOutcome,
};
use crate::domain::repository::{
    ensure_content, ApplicationQuery, ApplicationRepository, RepositoryError,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct Store {
    next_id: i64,
    rows: BTreeMap<ApplicationId, Application>,
}

#[derive(Clone, Default)]
pub struct InMemoryApplicationRepository {
    store: Arc<RwLock<Store>>,
}

impl InMemoryApplicationRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store {
    fn row_mut(
        &mut self,
        class: ApplicationClass,
        id: ApplicationId,
    ) -> Result<&mut Application, RepositoryError> {
        self.rows
            .get_mut(&id)
            .filter(|app| app.class == class)
            .ok_or_else(|| not_found(id))
    }
}

fn not_found(id: ApplicationId) -> RepositoryError {
    RepositoryError::NotFound(format!("application {id} not found"))
}

#[async_trait]
impl ApplicationRepository for InMemoryApplicationRepository {
    async fn create(&self, application: &NewApplication) -> Result<ApplicationId, RepositoryError> {
        ensure_content(&application.content)?;
        let mut store = self.store.write().await;
        store.next_id += 1;
        let id = ApplicationId(store.next_id);
        store.rows.insert(
            id,
            Application {
                id,
                class: application.class,
                state: ApplicationState::Reviewing,
                applier: application.applier.clone(),
                reviewer: None,
                apply_at: Utc::now(),
                review_at: None,
                decision: None,
                content: application.content.clone(),
            },
        );
        Ok(id)
    }

    async fn find_by_id(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(self.store.read().await.rows.get(&id).cloned())
    }

    async fn list(&self, query: &ApplicationQuery) -> Result<(Vec<Application>, i64), RepositoryError> {
        let store = self.store.read().await;
        let applier = query.applier_filter();
        let mut matching: Vec<Application> = store
            .rows
            .values()
            .filter(|a| a.class == query.class)
            .filter(|a| applier.is_none_or(|applier| a.applier == applier))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            b.state
                .as_i32()
                .cmp(&a.state.as_i32())
                .then_with(|| b.apply_at.cmp(&a.apply_at))
        });

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(usize::try_from(query.offset).unwrap_or(0))
            .take(usize::try_from(query.limit).unwrap_or(0))
            .collect();
        Ok((page, total))
    }

    async fn update_content(
        &self,
        class: ApplicationClass,
        id: ApplicationId,
        content: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        ensure_content(content)?;
        let mut store = self.store.write().await;
        let app = store.row_mut(class, id)?;
        app.content = content.clone();
        app.state = ApplicationState::Reviewing;
        app.apply_at = Utc::now();
        app.reviewer = None;
        app.review_at = None;
        app.decision = None;
        Ok(())
    }

    async fn delete(&self, class: ApplicationClass, id: ApplicationId) -> Result<(), RepositoryError> {
        let mut store = self.store.write().await;
        store.row_mut(class, id)?;
        store.rows.remove(&id);
        Ok(())
    }

    async fn decision(&self, class: ApplicationClass, id: ApplicationId) -> Result<String, RepositoryError> {
        let store = self.store.read().await;
        let app = store
            .rows
            .get(&id)
            .filter(|app| app.class == class)
            .ok_or_else(|| not_found(id))?;
        Ok(app.decision.clone().unwrap_or_default())
    }

    async fn review(
        &self,
        class: ApplicationClass,
        id: ApplicationId,
        outcome: &ReviewOutcome,
    ) -> Result<(), RepositoryError> {
        ensure_content(&outcome.content)?;
        let mut store = self.store.write().await;
        let app = store.row_mut(class, id)?;
        if app.state != ApplicationState::Reviewing {
            return Err(RepositoryError::Conflict(format!(
                "application {id} is already {}",
                app.state
            )));
        }
        app.state = outcome.state;
        app.decision = Some(outcome.decision.clone());
        app.reviewer = outcome.reviewer.clone();
        app.content = outcome.content.clone();
        app.review_at = Some(Utc::now());
        Ok(())
    }
}
