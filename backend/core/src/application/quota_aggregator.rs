// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Quota Aggregator Application Service
//!
//! Produces one resolved [`UserQuota`] per (user, mount) pair by merging each
//! user's live limits with the mount's default, field by field.
//!
//! ## Ordering
//!
//! Results are ordered users-outer, mounts-inner: for users `[a, b]` and
//! mounts `[m1, m2]` the output is `a@m1, a@m2, b@m1, b@m2`. Callers paginate
//! this flattened list by position.
//!
//! ## Failure policy
//!
//! Only a failure to list mounts (or to list users when none were given)
//! aborts a listing. A failed default or per-user lookup is logged, counted
//! in `hpcops_quota_lookup_failures_total`, and treated as "no data" so the
//! pair falls back to whatever else is known.

use crate::domain::error::OpsError;
use crate::domain::paging::{Page, PageRequest};
use crate::domain::quota::{MountPoint, UserQuota};
use crate::domain::quota_source::{ClusterResolver, ClusterService, IdentityProvider, QuotaSource};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

pub const LOOKUP_FAILURES_METRIC: &str = "hpcops_quota_lookup_failures_total";

pub struct QuotaAggregator {
    source: Arc<dyn QuotaSource>,
    identity: Arc<dyn IdentityProvider>,
    clusters: Arc<dyn ClusterResolver>,
    lookup_concurrency: usize,
}

impl QuotaAggregator {
    pub fn new(
        source: Arc<dyn QuotaSource>,
        identity: Arc<dyn IdentityProvider>,
        clusters: Arc<dyn ClusterResolver>,
        lookup_concurrency: usize,
    ) -> Self {
        Self {
            source,
            identity,
            clusters,
            lookup_concurrency: lookup_concurrency.max(1),
        }
    }

    /// List resolved quotas of `users` (all directory users when empty) on
    /// every Lustre mount of `cluster`, then cut the requested page.
    pub async fn list_quotas(
        &self,
        cluster: &str,
        users: Vec<String>,
        page: &PageRequest,
    ) -> Result<Page<UserQuota>, OpsError> {
        let addr = self.lustre_addr(cluster)?;

        let mut users: Vec<String> = users
            .into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect();
        if users.is_empty() {
            let identity_addr = self.clusters.resolve(cluster, ClusterService::Identity)?;
            users = self.identity.list_users(&identity_addr).await?;
            debug!(cluster, count = users.len(), "Resolved users from directory");
        }

        let mounts = self.source.list_mounts(&addr).await?;
        let records = self.reconcile(&users, &mounts, &addr).await;
        Ok(Page::from_all(page, records))
    }

    /// Resolve every (user, mount) pair. Never fails; see the module docs for
    /// how lookup failures degrade.
    pub async fn reconcile(&self, users: &[String], mounts: &[MountPoint], addr: &str) -> Vec<UserQuota> {
        // Every default is in hand before the first per-user lookup starts.
        let defaults = Arc::new(self.fetch_defaults(mounts, addr).await);

        // Lookup futures own their inputs.
        let pairs: Vec<(String, MountPoint)> = users
            .iter()
            .flat_map(|user| mounts.iter().map(move |mount| (user.clone(), mount.clone())))
            .collect();

        stream::iter(pairs)
            .map(|(user, mount)| {
                let source = self.source.clone();
                let addr = addr.to_string();
                let defaults = defaults.clone();
                async move {
                    let user_read = lookup_user(source.as_ref(), &addr, &user, &mount).await;
                    UserQuota::reconciled(&user, &mount, user_read.as_ref(), defaults.get(&mount))
                }
            })
            .buffered(self.lookup_concurrency)
            .collect()
            .await
    }

    /// Quota currently in effect for one user on one filesystem. The record
    /// keeps the caller's user and filesystem names.
    pub async fn actual_quota(&self, addr: &str, user: &str, filesystem: &str) -> UserQuota {
        let mount = MountPoint::new(filesystem);
        let default_read = lookup_default(self.source.as_ref(), addr, &mount).await;
        let user_read = lookup_user(self.source.as_ref(), addr, user, &mount).await;
        let resolved = UserQuota::reconciled(user, &mount, user_read.as_ref(), default_read.as_ref());
        UserQuota {
            filesystem: mount.to_string(),
            ..resolved
        }
    }

    /// Address of the command-execution service of `cluster`.
    pub fn lustre_addr(&self, cluster: &str) -> Result<String, OpsError> {
        Ok(self.clusters.resolve(cluster, ClusterService::Lustre)?)
    }

    async fn fetch_defaults(&self, mounts: &[MountPoint], addr: &str) -> HashMap<MountPoint, UserQuota> {
        stream::iter(mounts.to_vec())
            .map(|mount| {
                let source = self.source.clone();
                let addr = addr.to_string();
                async move {
                    let quota = lookup_default(source.as_ref(), &addr, &mount).await;
                    quota.map(|q| (mount, q))
                }
            })
            .buffered(self.lookup_concurrency)
            .filter_map(futures::future::ready)
            .collect()
            .await
    }
}

async fn lookup_default(source: &dyn QuotaSource, addr: &str, mount: &MountPoint) -> Option<UserQuota> {
    match source.default_quota(addr, mount).await {
        Ok(quota) => quota,
        Err(e) => {
            warn!(mount = %mount, error = %e, "Default quota lookup failed, treating as unset");
            metrics::counter!(LOOKUP_FAILURES_METRIC, "kind" => "default").increment(1);
            None
        }
    }
}

async fn lookup_user(source: &dyn QuotaSource, addr: &str, user: &str, mount: &MountPoint) -> Option<UserQuota> {
    match source.user_quota(addr, user, mount).await {
        Ok(quota) => quota,
        Err(e) => {
            warn!(user, mount = %mount, error = %e, "User quota lookup failed, falling back to default");
            metrics::counter!(LOOKUP_FAILURES_METRIC, "kind" => "user").increment(1);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::{limits, registry, FakeIdentity, FakeQuotaSource};

    fn aggregator(source: FakeQuotaSource) -> (QuotaAggregator, Arc<FakeQuotaSource>) {
        let source = Arc::new(source);
        let aggregator = QuotaAggregator::new(
            source.clone(),
            Arc::new(FakeIdentity::new(&["carol", "dave"])),
            Arc::new(registry()),
            4,
        );
        (aggregator, source)
    }

    fn mounts() -> Vec<MountPoint> {
        vec![MountPoint::new("/mnt/a"), MountPoint::new("/mnt/b")]
    }

    #[tokio::test]
    async fn test_one_record_per_mount_for_single_user() {
        let (agg, _) = aggregator(FakeQuotaSource::default());
        let records = agg.reconcile(&["alice".to_string()], &mounts(), "lustre:1").await;

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.user == "alice"));
        assert_eq!(records[0].filesystem, "/mnt/a");
        assert_eq!(records[1].filesystem, "/mnt/b");
    }

    #[tokio::test]
    async fn test_users_outer_mounts_inner() {
        let (agg, _) = aggregator(FakeQuotaSource::default());
        let users = vec!["alice".to_string(), "bob".to_string()];
        let records = agg.reconcile(&users, &mounts(), "lustre:1").await;

        let order: Vec<(&str, &str)> = records
            .iter()
            .map(|r| (r.user.as_str(), r.filesystem.as_str()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("alice", "/mnt/a"),
                ("alice", "/mnt/b"),
                ("bob", "/mnt/a"),
                ("bob", "/mnt/b"),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_user_lookup_falls_back_to_defaults() {
        let source = FakeQuotaSource::default()
            .with_default("/mnt/a", limits("100G", "200G", "1000", "2000"))
            .with_default("/mnt/b", limits("1G", "2G", "10", "20"))
            .with_user("alice", "/mnt/b", limits("none", "5G", "", ""))
            .failing_user("alice", "/mnt/a");
        let (agg, _) = aggregator(source);

        let records = agg.reconcile(&["alice".to_string()], &mounts(), "lustre:1").await;
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].limits, limits("100G", "200G", "1000", "2000"));
        assert_eq!(records[1].limits.block_soft.as_deref(), Some("1G"));
        assert_eq!(records[1].limits.block_hard.as_deref(), Some("5G"));
        assert_eq!(records[1].limits.file_hard.as_deref(), Some("20"));
    }

    #[tokio::test]
    async fn test_defaults_fetched_once_and_before_users() {
        let (agg, source) = aggregator(FakeQuotaSource::default());
        let users = vec!["alice".to_string(), "bob".to_string(), "eve".to_string()];
        agg.reconcile(&users, &mounts(), "lustre:1").await;

        let calls = source.calls().await;
        let default_calls: Vec<_> = calls.iter().filter(|c| c.starts_with("default:")).collect();
        assert_eq!(default_calls.len(), 2);

        let last_default = calls.iter().rposition(|c| c.starts_with("default:")).unwrap();
        let first_user = calls.iter().position(|c| c.starts_with("user:")).unwrap();
        assert!(last_default < first_user);
    }

    #[tokio::test]
    async fn test_failed_default_is_treated_as_absent() {
        let source = FakeQuotaSource::default()
            .with_default("/mnt/b", limits("1G", "", "", ""))
            .failing_default("/mnt/a");
        let (agg, _) = aggregator(source);

        let records = agg.reconcile(&["alice".to_string()], &mounts(), "lustre:1").await;
        assert!(records[0].limits.is_empty());
        assert_eq!(records[1].limits.block_soft.as_deref(), Some("1G"));
    }

    #[tokio::test]
    async fn test_list_quotas_uses_directory_when_no_users_given() {
        let source = FakeQuotaSource::default().with_mounts(&["/mnt/a"]);
        let (agg, _) = aggregator(source);

        let page = agg
            .list_quotas("hpc1", vec![" ".to_string()], &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.count, 2);
        assert_eq!(page.results[0].user, "carol");
        assert_eq!(page.results[1].user, "dave");
    }

    #[tokio::test]
    async fn test_list_quotas_paginates_flattened_list() {
        let source = FakeQuotaSource::default().with_mounts(&["/mnt/a", "/mnt/b"]);
        let (agg, _) = aggregator(source);
        let users = vec!["u1".to_string(), "u2".to_string(), "u3".to_string()];

        let page = agg
            .list_quotas("hpc1", users, &PageRequest::new(2, 4))
            .await
            .unwrap();
        assert_eq!(page.count, 6);
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[0].user, "u3");
    }

    #[tokio::test]
    async fn test_list_quotas_runs_as_spawned_task() {
        let source = FakeQuotaSource::default()
            .with_mounts(&["/mnt/a", "/mnt/b"])
            .with_default("/mnt/b", limits("1G", "", "", ""));
        let (agg, _) = aggregator(source);
        let agg = Arc::new(agg);

        let page = tokio::spawn(async move {
            let users = vec!["alice".to_string()];
            agg.list_quotas("hpc1", users, &PageRequest::default()).await
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(page.count, 2);
        assert_eq!(page.results[1].limits.block_soft.as_deref(), Some("1G"));
    }

    #[tokio::test]
    async fn test_mount_listing_failure_aborts() {
        let source = FakeQuotaSource::default().failing_mounts();
        let (agg, _) = aggregator(source);

        let err = agg
            .list_quotas("hpc1", vec!["alice".to_string()], &PageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OpsError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_unknown_cluster_is_not_found() {
        let (agg, _) = aggregator(FakeQuotaSource::default());
        let err = agg
            .list_quotas("nowhere", vec!["alice".to_string()], &PageRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OpsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_actual_quota_merges_single_pair() {
        let source = FakeQuotaSource::default()
            .with_default("/mnt/a", limits("1G", "2G", "", ""))
            .with_user("alice", "/mnt/a", limits("", "9G", "", ""));
        let (agg, _) = aggregator(source);

        let actual = agg.actual_quota("lustre:1", "alice", "/mnt/a").await;
        assert_eq!(actual.user, "alice");
        assert_eq!(actual.limits.block_soft.as_deref(), Some("1G"));
        assert_eq!(actual.limits.block_hard.as_deref(), Some("9G"));
    }
}
