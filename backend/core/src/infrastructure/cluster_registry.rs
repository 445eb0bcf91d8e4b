// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Static cluster address registry built from `spec.clusters`.

use crate::domain::node_config::ClusterConfig;
use crate::domain::quota_source::{ClusterResolveError, ClusterResolver, ClusterService};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct StaticClusterRegistry {
    clusters: HashMap<String, ClusterConfig>,
}

impl StaticClusterRegistry {
    pub fn new(clusters: impl IntoIterator<Item = ClusterConfig>) -> Self {
        Self {
            clusters: clusters
                .into_iter()
                .map(|c| (c.name.clone(), c))
                .collect(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clusters.keys().map(String::as_str)
    }
}

impl ClusterResolver for StaticClusterRegistry {
    fn resolve(&self, cluster: &str, service: ClusterService) -> Result<String, ClusterResolveError> {
        let config = self
            .clusters
            .get(cluster.trim())
            .ok_or_else(|| ClusterResolveError::UnknownCluster(cluster.to_string()))?;

        let addr = match service {
            ClusterService::Lustre => config.lustre_server.trim(),
            ClusterService::Identity => config.slurmrestd.trim(),
        };
        if addr.is_empty() {
            return Err(ClusterResolveError::MissingAddress {
                cluster: cluster.to_string(),
                service: service.to_string(),
            });
        }
        Ok(addr.to_string())
    }
}
