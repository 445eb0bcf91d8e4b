// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Direct Quota Updates
//!
//! Administrative quota changes that bypass the application workflow: set one
//! user's limits, or set a mount's default limits. Both build their commands
//! with `crate::domain::quota_command` and execute them immediately.

use crate::domain::error::OpsError;
use crate::domain::quota::UserQuota;
use crate::domain::quota_command::{self, QuotaCommandPlan, QuotaTarget};
use crate::domain::quota_source::{ClusterResolver, ClusterService, QuotaSource};
use std::sync::Arc;
use tracing::{error, info};

pub const COMMANDS_METRIC: &str = "hpcops_quota_commands_total";

/// Run every command of `plan` in order, stopping at the first failure.
pub(crate) async fn run_plan(
    source: &dyn QuotaSource,
    addr: &str,
    plan: &QuotaCommandPlan,
) -> Result<(), OpsError> {
    for command in plan.commands() {
        match source.run(addr, command).await {
            Ok(()) => {
                info!(command, "Quota command applied");
                metrics::counter!(COMMANDS_METRIC, "outcome" => "success").increment(1);
            }
            Err(e) => {
                error!(command, error = %e, "Quota command failed");
                metrics::counter!(COMMANDS_METRIC, "outcome" => "failure").increment(1);
                return Err(OpsError::Upstream(format!("failed to apply quota: {e}")));
            }
        }
    }
    Ok(())
}

pub(crate) fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, OpsError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(OpsError::validation(format!("{field} is required")));
    }
    Ok(value)
}

pub struct QuotaUpdateService {
    source: Arc<dyn QuotaSource>,
    clusters: Arc<dyn ClusterResolver>,
}

impl QuotaUpdateService {
    pub fn new(source: Arc<dyn QuotaSource>, clusters: Arc<dyn ClusterResolver>) -> Self {
        Self { source, clusters }
    }

    /// Set `user`'s limits on `quota.filesystem`. The `user` field of the
    /// body is ignored in favour of the explicit argument.
    pub async fn update_user_quota(&self, cluster: &str, user: &str, quota: &UserQuota) -> Result<(), OpsError> {
        let user = required("user", user)?;
        let mount = required("filesystem", &quota.filesystem)?;
        self.apply(cluster, QuotaTarget::User(user.to_string()), quota, mount)
            .await
    }

    /// Set the default limits of `quota.filesystem`.
    pub async fn update_default_quota(&self, cluster: &str, quota: &UserQuota) -> Result<(), OpsError> {
        let mount = required("filesystem", &quota.filesystem)?;
        self.apply(cluster, QuotaTarget::Default, quota, mount).await
    }

    async fn apply(
        &self,
        cluster: &str,
        target: QuotaTarget,
        quota: &UserQuota,
        mount: &str,
    ) -> Result<(), OpsError> {
        // Direct updates must change at least one limit; grace alone is not enough.
        let limits = quota_command::limit_command(&target, &quota.limits, mount)?;
        let grace = quota_command::grace_command(&target, &quota.limits, mount)?;
        let plan = QuotaCommandPlan {
            limits: Some(limits),
            grace,
        };

        let addr = self.clusters.resolve(cluster, ClusterService::Lustre)?;
        run_plan(self.source.as_ref(), &addr, &plan).await
    }
}
