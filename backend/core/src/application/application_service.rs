// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Quota Application Service
//!
//! Submission side of the quota-application workflow: submit, list, amend,
//! withdraw, and read the decision. Reviews live in
//! [`crate::application::review_processor`].
//!
//! Listings pair every stored request (`apply`) with the quota currently in
//! effect on the cluster (`actual`). The live view is best effort: a failed
//! lookup yields an empty record rather than failing the listing.

use crate::application::quota_aggregator::QuotaAggregator;
use crate::domain::application::{
    Application, ApplicationClass, ApplicationId, NewApplication, QuotaApplication,
};
use crate::domain::error::OpsError;
use crate::domain::paging::{Page, PageRequest};
use crate::domain::quota::UserQuota;
use crate::domain::repository::{ApplicationQuery, ApplicationRepository};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

#[async_trait]
pub trait ApplicationService: Send + Sync {
    /// Store a new request in `REVIEWING`. The applier is the request's user.
    async fn create(&self, quota: UserQuota) -> Result<ApplicationId, OpsError>;

    /// Page through Lustre applications, optionally filtered by applier.
    async fn list(
        &self,
        cluster: &str,
        applier: Option<String>,
        page: &PageRequest,
    ) -> Result<Page<QuotaApplication>, OpsError>;

    /// Replace the requested quota and send the application back to review.
    async fn update(&self, id: ApplicationId, quota: UserQuota) -> Result<(), OpsError>;

    async fn delete(&self, id: ApplicationId) -> Result<(), OpsError>;

    async fn decision(&self, id: ApplicationId) -> Result<String, OpsError>;
}

pub struct StandardApplicationService {
    repository: Arc<dyn ApplicationRepository>,
    aggregator: Arc<QuotaAggregator>,
    lookup_concurrency: usize,
}

impl StandardApplicationService {
    pub fn new(
        repository: Arc<dyn ApplicationRepository>,
        aggregator: Arc<QuotaAggregator>,
        lookup_concurrency: usize,
    ) -> Self {
        Self {
            repository,
            aggregator,
            lookup_concurrency: lookup_concurrency.max(1),
        }
    }

    async fn present(&self, addr: &str, application: Application) -> QuotaApplication {
        let apply = application.quota().unwrap_or_else(|e| {
            warn!(id = %application.id, error = %e, "Stored application content is not a quota");
            UserQuota::default()
        });

        let actual = if apply.user.trim().is_empty() || apply.filesystem.trim().is_empty() {
            UserQuota::default()
        } else {
            self.aggregator
                .actual_quota(addr, apply.user.trim(), &apply.filesystem)
                .await
        };

        QuotaApplication {
            id: application.id,
            state: application.state,
            applier: application.applier,
            reviewer: application.reviewer,
            apply_at: application.apply_at,
            review_at: application.review_at,
            decision: application.decision.unwrap_or_default(),
            apply,
            actual,
        }
    }
}

fn content_of(quota: &UserQuota) -> Result<serde_json::Value, OpsError> {
    serde_json::to_value(quota)
        .map_err(|e| OpsError::Persistence(format!("failed to encode application: {e}")))
}

#[async_trait]
impl ApplicationService for StandardApplicationService {
    async fn create(&self, quota: UserQuota) -> Result<ApplicationId, OpsError> {
        let applier = quota.user.trim().to_string();
        if applier.is_empty() {
            return Err(OpsError::validation("user is required"));
        }

        let application = NewApplication {
            class: ApplicationClass::Lustre,
            applier: applier.clone(),
            content: content_of(&quota)?,
        };
        let id = self.repository.create(&application).await?;
        info!(%id, applier, filesystem = %quota.filesystem, "Quota application submitted");
        Ok(id)
    }

    async fn list(
        &self,
        cluster: &str,
        applier: Option<String>,
        page: &PageRequest,
    ) -> Result<Page<QuotaApplication>, OpsError> {
        let addr = self.aggregator.lustre_addr(cluster)?;

        let (limit, offset) = if page.paging {
            (page.page_size, page.offset())
        } else {
            (i64::MAX, 0)
        };
        let query = ApplicationQuery {
            class: ApplicationClass::Lustre,
            applier,
            limit,
            offset,
        };
        let (applications, total) = self.repository.list(&query).await?;

        let addr = addr.as_str();
        let results = stream::iter(applications)
            .map(|application| self.present(addr, application))
            .buffered(self.lookup_concurrency)
            .collect()
            .await;

        Ok(Page {
            count: usize::try_from(total).unwrap_or(0),
            results,
        })
    }

    async fn update(&self, id: ApplicationId, quota: UserQuota) -> Result<(), OpsError> {
        self.repository
            .update_content(ApplicationClass::Lustre, id, &content_of(&quota)?)
            .await?;
        info!(%id, "Quota application amended, back in review");
        Ok(())
    }

    async fn delete(&self, id: ApplicationId) -> Result<(), OpsError> {
        self.repository.delete(ApplicationClass::Lustre, id).await?;
        info!(%id, "Quota application deleted");
        Ok(())
    }

    async fn decision(&self, id: ApplicationId) -> Result<String, OpsError> {
        Ok(self.repository.decision(ApplicationClass::Lustre, id).await?)
    }
}
