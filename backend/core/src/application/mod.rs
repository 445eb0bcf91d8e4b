// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod application_service;
pub mod quota_aggregator;
pub mod quota_update;
pub mod repository_factory;
pub mod review_processor;

pub use application_service::{ApplicationService, StandardApplicationService};
pub use quota_aggregator::QuotaAggregator;
pub use quota_update::QuotaUpdateService;
pub use review_processor::{ReviewProcessor, ReviewRequest};

/// Scripted collaborators shared by the service unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use crate::domain::node_config::ClusterConfig;
    use crate::domain::quota::{MountPoint, QuotaLimitSet, UserQuota};
    use crate::domain::quota_source::{
        IdentityError, IdentityProvider, QuotaSource, QuotaSourceError,
    };
    use crate::infrastructure::cluster_registry::StaticClusterRegistry;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use tokio::sync::Mutex;

    pub fn limits(bs: &str, bh: &str, fs: &str, fh: &str) -> QuotaLimitSet {
        QuotaLimitSet {
            block_soft: bs.into(),
            block_hard: bh.into(),
            file_soft: fs.into(),
            file_hard: fh.into(),
            ..Default::default()
        }
    }

    pub fn registry() -> StaticClusterRegistry {
        StaticClusterRegistry::new(vec![ClusterConfig {
            name: "hpc1".into(),
            lustre_server: "lustre:1".into(),
            slurmrestd: "slurm:1".into(),
        }])
    }

    #[derive(Default)]
    pub struct FakeQuotaSource {
        mounts: Vec<MountPoint>,
        fail_mounts: bool,
        defaults: HashMap<String, QuotaLimitSet>,
        users: HashMap<(String, String), QuotaLimitSet>,
        failing_defaults: HashSet<String>,
        failing_users: HashSet<(String, String)>,
        fail_run_containing: Option<String>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeQuotaSource {
        pub fn with_mounts(mut self, mounts: &[&str]) -> Self {
            self.mounts = mounts.iter().map(|m| MountPoint::new(*m)).collect();
            self
        }

        pub fn with_default(mut self, mount: &str, limits: QuotaLimitSet) -> Self {
            self.defaults.insert(mount.to_string(), limits);
            self
        }

        pub fn with_user(mut self, user: &str, mount: &str, limits: QuotaLimitSet) -> Self {
            self.users.insert((user.to_string(), mount.to_string()), limits);
            self
        }

        pub fn failing_mounts(mut self) -> Self {
            self.fail_mounts = true;
            self
        }

        pub fn failing_default(mut self, mount: &str) -> Self {
            self.failing_defaults.insert(mount.to_string());
            self
        }

        pub fn failing_user(mut self, user: &str, mount: &str) -> Self {
            self.failing_users.insert((user.to_string(), mount.to_string()));
            self
        }

        /// Fail any `run` whose command contains `needle`.
        pub fn failing_run(mut self, needle: &str) -> Self {
            self.fail_run_containing = Some(needle.to_string());
            self
        }

        pub async fn calls(&self) -> Vec<String> {
            self.calls.lock().await.clone()
        }

        pub async fn runs(&self) -> Vec<String> {
            self.calls
                .lock()
                .await
                .iter()
                .filter_map(|c| c.strip_prefix("run:").map(str::to_string))
                .collect()
        }
    }

    fn unavailable() -> QuotaSourceError {
        QuotaSourceError::Rejected {
            code: 500,
            message: "scripted failure".into(),
        }
    }

    #[async_trait]
    impl QuotaSource for FakeQuotaSource {
        async fn list_mounts(&self, _addr: &str) -> Result<Vec<MountPoint>, QuotaSourceError> {
            self.calls.lock().await.push("mounts".into());
            if self.fail_mounts {
                return Err(unavailable());
            }
            Ok(self.mounts.clone())
        }

        async fn default_quota(
            &self,
            _addr: &str,
            mount: &MountPoint,
        ) -> Result<Option<UserQuota>, QuotaSourceError> {
            self.calls.lock().await.push(format!("default:{mount}"));
            if self.failing_defaults.contains(mount.as_str()) {
                return Err(unavailable());
            }
            Ok(self
                .defaults
                .get(mount.as_str())
                .map(|l| UserQuota::new("", "", l.clone())))
        }

        async fn user_quota(
            &self,
            _addr: &str,
            user: &str,
            mount: &MountPoint,
        ) -> Result<Option<UserQuota>, QuotaSourceError> {
            self.calls.lock().await.push(format!("user:{user}:{mount}"));
            let key = (user.to_string(), mount.as_str().to_string());
            if self.failing_users.contains(&key) {
                return Err(unavailable());
            }
            Ok(self.users.get(&key).map(|l| UserQuota::new(user, "", l.clone())))
        }

        async fn run(&self, _addr: &str, command: &str) -> Result<(), QuotaSourceError> {
            self.calls.lock().await.push(format!("run:{command}"));
            match &self.fail_run_containing {
                Some(needle) if command.contains(needle.as_str()) => Err(unavailable()),
                _ => Ok(()),
            }
        }
    }

    pub struct FakeIdentity {
        users: Vec<String>,
    }

    impl FakeIdentity {
        pub fn new(users: &[&str]) -> Self {
            Self {
                users: users.iter().map(|u| u.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl IdentityProvider for FakeIdentity {
        async fn list_users(&self, _addr: &str) -> Result<Vec<String>, IdentityError> {
            Ok(self.users.clone())
        }
    }
}
