// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # External Collaborator Contracts
//!
//! Interfaces for the services this backend talks to, defined in the domain
//! layer so application services stay independent of HTTP details.
//!
//! - [`QuotaSource`]: the Lustre command-execution service
//! - [`IdentityProvider`]: the LDAP-fronting user directory
//! - [`ClusterResolver`]: cluster name → service address lookup
//!
//! Implementations live in `crate::infrastructure`. None of them retry.

use crate::domain::quota::{MountPoint, UserQuota};
use async_trait::async_trait;
use thiserror::Error;

/// Quota Source Gateway.
///
/// `addr` is the `host:port` of the command-execution service for the
/// cluster being addressed.
#[async_trait]
pub trait QuotaSource: Send + Sync {
    /// Mount points of all Lustre filesystems on the cluster.
    async fn list_mounts(&self, addr: &str) -> Result<Vec<MountPoint>, QuotaSourceError>;

    /// Default quota of `mount`, `None` when the service reports none.
    async fn default_quota(
        &self,
        addr: &str,
        mount: &MountPoint,
    ) -> Result<Option<UserQuota>, QuotaSourceError>;

    /// Quota of `user` on `mount`, `None` when the service reports none.
    async fn user_quota(
        &self,
        addr: &str,
        user: &str,
        mount: &MountPoint,
    ) -> Result<Option<UserQuota>, QuotaSourceError>;

    /// Execute a privileged command line.
    async fn run(&self, addr: &str, command: &str) -> Result<(), QuotaSourceError>;
}

#[derive(Debug, Error)]
pub enum QuotaSourceError {
    #[error("request to command-execution service failed: {0}")]
    Network(String),

    #[error("unexpected http status {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("command rejected: code={code}, msg={message}")]
    Rejected { code: i64, message: String },

    #[error("failed to decode command-execution response: {0}")]
    Decode(String),

    #[error("refusing to build command: {0}")]
    InvalidArgument(String),
}

impl QuotaSourceError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Status { .. } => "status",
            Self::Rejected { .. } => "rejected",
            Self::Decode(_) => "decode",
            Self::InvalidArgument(_) => "invalid_argument",
        }
    }
}

/// Identity collaborator.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// All user names known to the directory, in directory order.
    async fn list_users(&self, addr: &str) -> Result<Vec<String>, IdentityError>;
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("request to identity service failed: {0}")]
    Network(String),

    #[error("identity service returned http status {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("failed to decode identity response: {0}")]
    Decode(String),
}

/// Which backend service of a cluster an address is needed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterService {
    Lustre,
    Identity,
}

impl std::fmt::Display for ClusterService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lustre => f.write_str("lustre_server"),
            Self::Identity => f.write_str("slurmrestd"),
        }
    }
}

/// Cluster name → backend address lookup.
pub trait ClusterResolver: Send + Sync {
    fn resolve(&self, cluster: &str, service: ClusterService) -> Result<String, ClusterResolveError>;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClusterResolveError {
    #[error("unknown cluster: {0}")]
    UnknownCluster(String),

    #[error("empty {service} address for cluster {cluster}")]
    MissingAddress { cluster: String, service: String },
}
