// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Postgres Application
//!
//! PostgreSQL implementation of [`ApplicationRepository`] over the shared
//! `applications` table.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Persists quota applications and their review outcomes
//!
//! Filtered listings are composed with [`sqlx::QueryBuilder`] so every
//! predicate value is a bind parameter.

use crate::domain::application::{
    Application, ApplicationClass, ApplicationId, ApplicationState, NewApplication, ReviewOutcome,
};
use crate::domain::repository::{
    ensure_content, ApplicationQuery, ApplicationRepository, RepositoryError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow, Postgres};
use sqlx::{QueryBuilder, Row};

const SELECT_COLUMNS: &str =
    "SELECT id, class, state, applyat, reviewat, applier, reviewer, decision, content FROM applications";

pub struct PostgresApplicationRepository {
    pool: PgPool,
}

impl PostgresApplicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn push_filters<'a>(builder: &mut QueryBuilder<'a, Postgres>, query: &'a ApplicationQuery) {
    builder.push(" WHERE class = ").push_bind(query.class.as_str());
    if let Some(applier) = query.applier_filter() {
        builder.push(" AND applier = ").push_bind(applier);
    }
}

/// Page query: filters, fixed ordering, then the window.
pub(crate) fn list_query(query: &ApplicationQuery) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new(SELECT_COLUMNS);
    push_filters(&mut builder, query);
    builder
        .push(" ORDER BY state DESC, applyat DESC LIMIT ")
        .push_bind(query.limit)
        .push(" OFFSET ")
        .push_bind(query.offset);
    builder
}

pub(crate) fn count_query(query: &ApplicationQuery) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM applications");
    push_filters(&mut builder, query);
    builder
}

fn not_found(id: ApplicationId) -> RepositoryError {
    RepositoryError::NotFound(format!("application {id} not found"))
}

#[async_trait]
impl ApplicationRepository for PostgresApplicationRepository {
    async fn create(&self, application: &NewApplication) -> Result<ApplicationId, RepositoryError> {
        ensure_content(&application.content)?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO applications (class, state, applier, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(application.class.as_str())
        .bind(ApplicationState::Reviewing.as_i32())
        .bind(&application.applier)
        .bind(&application.content)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to create application: {}", e)))?;

        Ok(ApplicationId(id))
    }

    async fn find_by_id(&self, id: ApplicationId) -> Result<Option<Application>, RepositoryError> {
        let row = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(parse_application_row).transpose()
    }

    async fn list(&self, query: &ApplicationQuery) -> Result<(Vec<Application>, i64), RepositoryError> {
        let total: i64 = count_query(query)
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let rows = list_query(query).build().fetch_all(&self.pool).await?;

        let mut applications = Vec::with_capacity(rows.len());
        for row in rows {
            applications.push(parse_application_row(row)?);
        }
        Ok((applications, total))
    }

    async fn update_content(
        &self,
        class: ApplicationClass,
        id: ApplicationId,
        content: &serde_json::Value,
    ) -> Result<(), RepositoryError> {
        ensure_content(content)?;

        let result = sqlx::query(
            r#"
            UPDATE applications
            SET content = $1,
                state = $2,
                applyat = now(),
                reviewat = NULL,
                reviewer = NULL,
                decision = NULL
            WHERE id = $3 AND class = $4
            "#,
        )
        .bind(content)
        .bind(ApplicationState::Reviewing.as_i32())
        .bind(id.0)
        .bind(class.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to update application: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn delete(&self, class: ApplicationClass, id: ApplicationId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM applications WHERE id = $1 AND class = $2")
            .bind(id.0)
            .bind(class.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn decision(&self, class: ApplicationClass, id: ApplicationId) -> Result<String, RepositoryError> {
        let decision: Option<Option<String>> =
            sqlx::query_scalar("SELECT decision FROM applications WHERE id = $1 AND class = $2")
                .bind(id.0)
                .bind(class.as_str())
                .fetch_optional(&self.pool)
                .await?;

        decision.map(Option::unwrap_or_default).ok_or_else(|| not_found(id))
    }

    async fn review(
        &self,
        class: ApplicationClass,
        id: ApplicationId,
        outcome: &ReviewOutcome,
    ) -> Result<(), RepositoryError> {
        ensure_content(&outcome.content)?;

        let result = sqlx::query(
            r#"
            UPDATE applications
            SET decision = $1,
                content = $2,
                reviewer = $3,
                reviewat = now(),
                state = $4
            WHERE id = $5 AND class = $6 AND state = $7
            "#,
        )
        .bind(&outcome.decision)
        .bind(&outcome.content)
        .bind(&outcome.reviewer)
        .bind(outcome.state.as_i32())
        .bind(id.0)
        .bind(class.as_str())
        .bind(ApplicationState::Reviewing.as_i32())
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to record review: {}", e)))?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        // Distinguish a missing row from one another reviewer already decided.
        let state: Option<i32> =
            sqlx::query_scalar("SELECT state FROM applications WHERE id = $1 AND class = $2")
                .bind(id.0)
                .bind(class.as_str())
                .fetch_optional(&self.pool)
                .await?;

        match state {
            None => Err(not_found(id)),
            Some(raw) => Err(RepositoryError::Conflict(format!(
                "application {id} is already {}",
                ApplicationState::from_i32(raw)
                    .map(ApplicationState::label)
                    .unwrap_or("in an unknown state")
            ))),
        }
    }
}

fn parse_application_row(row: PgRow) -> Result<Application, RepositoryError> {
    let class: String = row.try_get("class")?;
    let class = match class.as_str() {
        "lustre" => ApplicationClass::Lustre,
        "slurm" => ApplicationClass::Slurm,
        other => {
            return Err(RepositoryError::Serialization(format!(
                "unknown application class: {other}"
            )))
        }
    };

    let state: i32 = row.try_get("state")?;
    let state = ApplicationState::from_i32(state).ok_or_else(|| {
        RepositoryError::Serialization(format!("unknown application state: {state}"))
    })?;

    let apply_at: DateTime<Utc> = row.try_get("applyat")?;
    let review_at: Option<DateTime<Utc>> = row.try_get("reviewat")?;

    Ok(Application {
        id: ApplicationId(row.try_get("id")?),
        class,
        state,
        applier: row.try_get::<Option<String>, _>("applier")?.unwrap_or_default(),
        reviewer: row.try_get("reviewer")?,
        apply_at,
        review_at,
        decision: row.try_get("decision")?,
        content: row.try_get("content")?,
    })
}
