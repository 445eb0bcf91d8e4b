// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Review Processor
//!
//! Decides a pending quota application. Approval applies the reviewed limits
//! on the cluster **before** the application is marked `PASSED`; if any
//! command fails the application stays in `REVIEWING` and can be reviewed
//! again. Rejection never touches the cluster.
//!
//! The reviewer may edit the quota while deciding; whatever they submit
//! replaces the stored request.

use crate::application::quota_update::{required, run_plan};
use crate::domain::application::{ApplicationClass, ApplicationId, ApplicationState, ReviewOutcome};
use crate::domain::error::OpsError;
use crate::domain::quota::UserQuota;
use crate::domain::quota_command::{self, QuotaTarget};
use crate::domain::quota_source::{ClusterResolver, ClusterService, QuotaSource};
use crate::domain::repository::ApplicationRepository;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

pub const REVIEWS_METRIC: &str = "hpcops_reviews_total";

/// Review body: the verdict plus the (possibly edited) quota, flattened.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReviewRequest {
    pub approve: bool,
    #[serde(default)]
    pub decision: String,
    #[serde(default)]
    pub reviewer: Option<String>,
    #[serde(flatten)]
    pub quota: UserQuota,
}

pub struct ReviewProcessor {
    repository: Arc<dyn ApplicationRepository>,
    source: Arc<dyn QuotaSource>,
    clusters: Arc<dyn ClusterResolver>,
}

impl ReviewProcessor {
    pub fn new(
        repository: Arc<dyn ApplicationRepository>,
        source: Arc<dyn QuotaSource>,
        clusters: Arc<dyn ClusterResolver>,
    ) -> Self {
        Self {
            repository,
            source,
            clusters,
        }
    }

    /// Review application `id` and return the state it ended in.
    pub async fn review(
        &self,
        cluster: &str,
        id: ApplicationId,
        request: &ReviewRequest,
    ) -> Result<ApplicationState, OpsError> {
        let application = self
            .repository
            .find_by_id(id)
            .await?
            .filter(|a| a.class == ApplicationClass::Lustre)
            .ok_or_else(|| OpsError::NotFound(format!("application {id} not found")))?;

        if application.state != ApplicationState::Reviewing {
            return Err(OpsError::Conflict(format!(
                "application {id} is already {}",
                application.state
            )));
        }

        let state = if request.approve {
            self.apply(cluster, id, &request.quota).await?;
            ApplicationState::Passed
        } else {
            ApplicationState::Rejected
        };

        let content = serde_json::to_value(&request.quota)
            .map_err(|e| OpsError::Persistence(format!("failed to encode application: {e}")))?;
        let outcome = ReviewOutcome {
            state,
            decision: request.decision.clone(),
            reviewer: request
                .reviewer
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string),
            content,
        };
        self.repository
            .review(ApplicationClass::Lustre, id, &outcome)
            .await?;

        metrics::counter!(REVIEWS_METRIC, "decision" => state.label()).increment(1);
        info!(%id, state = %state, "Quota application reviewed");
        Ok(state)
    }

    async fn apply(&self, cluster: &str, id: ApplicationId, quota: &UserQuota) -> Result<(), OpsError> {
        let user = required("user", &quota.user)?;
        let mount = required("filesystem", &quota.filesystem)?;

        let plan = quota_command::plan(&QuotaTarget::User(user.to_string()), &quota.limits, mount)?;
        if plan.is_empty() {
            warn!(%id, user, mount, "Approved application carries no limits, nothing to apply");
            return Ok(());
        }

        let addr = self.clusters.resolve(cluster, ClusterService::Lustre)?;
        run_plan(self.source.as_ref(), &addr, &plan).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{limits, registry, FakeQuotaSource};
    use crate::domain::application::NewApplication;
    use crate::infrastructure::repositories::InMemoryApplicationRepository;

    struct Fixture {
        processor: ReviewProcessor,
        repository: InMemoryApplicationRepository,
        source: Arc<FakeQuotaSource>,
    }

    fn fixture(source: FakeQuotaSource) -> Fixture {
        let repository = InMemoryApplicationRepository::default();
        let source = Arc::new(source);
        let processor = ReviewProcessor::new(
            Arc::new(repository.clone()),
            source.clone(),
            Arc::new(registry()),
        );
        Fixture {
            processor,
            repository,
            source,
        }
    }

    async fn submit(repository: &InMemoryApplicationRepository, quota: &UserQuota) -> ApplicationId {
        repository
            .create(&NewApplication {
                class: ApplicationClass::Lustre,
                applier: quota.user.clone(),
                content: serde_json::to_value(quota).unwrap(),
            })
            .await
            .unwrap()
    }

    fn approve(quota: UserQuota) -> ReviewRequest {
        ReviewRequest {
            approve: true,
            decision: "ok".into(),
            reviewer: Some("admin".into()),
            quota,
        }
    }

    #[tokio::test]
    async fn test_approve_applies_then_passes() {
        let fx = fixture(FakeQuotaSource::default());
        let mut quota = UserQuota::new("alice", "/mnt/a", limits("", "1T", "", ""));
        let id = submit(&fx.repository, &quota).await;
        quota.limits.block_grace = "7d".into();

        let state = fx.processor.review("hpc1", id, &approve(quota)).await.unwrap();
        assert_eq!(state, ApplicationState::Passed);
        assert_eq!(
            fx.source.runs().await,
            vec![
                "lfs setquota -u alice -B 1T /mnt/a",
                "lfs setquota -t --block-grace=7d /mnt/a",
            ]
        );

        let stored = fx.repository.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.state, ApplicationState::Passed);
        assert_eq!(stored.reviewer.as_deref(), Some("admin"));
        assert_eq!(stored.decision.as_deref(), Some("ok"));
        assert!(stored.review_at.is_some());
        assert_eq!(stored.quota().unwrap().limits.block_grace.as_deref(), Some("7d"));
    }

    #[tokio::test]
    async fn test_reject_never_touches_cluster() {
        let fx = fixture(FakeQuotaSource::default());
        let quota = UserQuota::new("alice", "/mnt/a", limits("", "1T", "", ""));
        let id = submit(&fx.repository, &quota).await;

        let request = ReviewRequest {
            approve: false,
            decision: "too large".into(),
            reviewer: None,
            quota,
        };
        let state = fx.processor.review("hpc1", id, &request).await.unwrap();
        assert_eq!(state, ApplicationState::Rejected);
        assert!(fx.source.calls().await.is_empty());
        assert_eq!(fx.repository.decision(ApplicationClass::Lustre, id).await.unwrap(), "too large");
    }

    #[tokio::test]
    async fn test_approve_without_filesystem_leaves_application_pending() {
        let fx = fixture(FakeQuotaSource::default());
        let quota = UserQuota::new("alice", "", limits("", "1T", "", ""));
        let id = submit(&fx.repository, &quota).await;

        let err = fx.processor.review("hpc1", id, &approve(quota)).await.unwrap_err();
        assert!(matches!(err, OpsError::Validation(ref m) if m == "filesystem is required"));

        let stored = fx.repository.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.state, ApplicationState::Reviewing);
    }

    #[tokio::test]
    async fn test_failed_command_leaves_application_pending() {
        let fx = fixture(FakeQuotaSource::default().failing_run("-t"));
        let mut quota = UserQuota::new("alice", "/mnt/a", limits("1G", "", "", ""));
        quota.limits.file_grace = "1w".into();
        let id = submit(&fx.repository, &quota).await;

        let err = fx.processor.review("hpc1", id, &approve(quota.clone())).await.unwrap_err();
        assert!(matches!(err, OpsError::Upstream(_)));
        assert_eq!(fx.source.runs().await.len(), 2);

        let stored = fx.repository.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.state, ApplicationState::Reviewing);
        assert_eq!(stored.decision, None);
    }

    #[tokio::test]
    async fn test_second_review_conflicts() {
        let fx = fixture(FakeQuotaSource::default());
        let quota = UserQuota::new("alice", "/mnt/a", limits("", "1T", "", ""));
        let id = submit(&fx.repository, &quota).await;

        fx.processor.review("hpc1", id, &approve(quota.clone())).await.unwrap();
        let err = fx.processor.review("hpc1", id, &approve(quota)).await.unwrap_err();
        assert!(matches!(err, OpsError::Conflict(_)));
        assert_eq!(fx.source.runs().await.len(), 1);
    }

    #[tokio::test]
    async fn test_amended_application_can_be_reviewed_again() {
        let fx = fixture(FakeQuotaSource::default());
        let quota = UserQuota::new("alice", "/mnt/a", limits("", "1T", "", ""));
        let id = submit(&fx.repository, &quota).await;
        fx.processor.review("hpc1", id, &approve(quota.clone())).await.unwrap();

        fx.repository
            .update_content(ApplicationClass::Lustre, id, &serde_json::to_value(&quota).unwrap())
            .await
            .unwrap();
        let amended = fx.repository.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(amended.state, ApplicationState::Reviewing);
        assert_eq!(amended.reviewer, None);
        assert_eq!(amended.review_at, None);
        assert_eq!(amended.decision, None);

        let state = fx.processor.review("hpc1", id, &approve(quota)).await.unwrap();
        assert_eq!(state, ApplicationState::Passed);
    }

    #[tokio::test]
    async fn test_approve_without_limits_skips_execution() {
        let fx = fixture(FakeQuotaSource::default());
        let quota = UserQuota::new("alice", "/mnt/a", limits("none", "", "", ""));
        let id = submit(&fx.repository, &quota).await;

        let state = fx.processor.review("hpc1", id, &approve(quota)).await.unwrap();
        assert_eq!(state, ApplicationState::Passed);
        assert!(fx.source.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_application() {
        let fx = fixture(FakeQuotaSource::default());
        let quota = UserQuota::new("alice", "/mnt/a", limits("", "1T", "", ""));
        let err = fx
            .processor
            .review("hpc1", ApplicationId(77), &approve(quota))
            .await
            .unwrap_err();
        assert!(matches!(err, OpsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_other_class_application_is_not_reviewed() {
        let fx = fixture(FakeQuotaSource::default());
        let id = fx
            .repository
            .create(&NewApplication {
                class: ApplicationClass::Slurm,
                applier: "alice".into(),
                content: serde_json::json!({"partition": "gpu"}),
            })
            .await
            .unwrap();
        let quota = UserQuota::new("alice", "/mnt/a", limits("", "1T", "", ""));

        let err = fx.processor.review("hpc1", id, &approve(quota)).await.unwrap_err();
        assert!(matches!(err, OpsError::NotFound(_)));
        assert!(fx.source.calls().await.is_empty());
    }

    #[test]
    fn test_review_request_flattens_quota() {
        let request: ReviewRequest = serde_json::from_value(serde_json::json!({
            "approve": true,
            "decision": "fine",
            "user": "alice",
            "filesystem": "/mnt/a",
            "block_quota_hard_limit": "2T"
        }))
        .unwrap();
        assert!(request.approve);
        assert_eq!(request.quota.user, "alice");
        assert_eq!(request.quota.limits.block_hard.as_deref(), Some("2T"));
    }
}
