// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Error taxonomy for the quota and application services.
//!
//! Every failure an application service returns falls into one of these
//! kinds; handlers map them to HTTP status codes without inspecting messages.

use crate::domain::quota_command::QuotaCommandError;
use crate::domain::quota_source::{ClusterResolveError, IdentityError, QuotaSourceError};
use crate::domain::repository::RepositoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OpsError {
    /// Missing or malformed input. Nothing was mutated.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// A state precondition failed, e.g. reviewing an already decided
    /// application.
    #[error("{0}")]
    Conflict(String),

    /// The command-execution or identity service failed.
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Persistence(String),
}

impl OpsError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Upstream(_) => "upstream",
            Self::Persistence(_) => "persistence",
        }
    }
}

impl From<RepositoryError> for OpsError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => OpsError::NotFound(msg),
            RepositoryError::Conflict(msg) => OpsError::Conflict(msg),
            other => OpsError::Persistence(other.to_string()),
        }
    }
}

impl From<QuotaSourceError> for OpsError {
    fn from(err: QuotaSourceError) -> Self {
        OpsError::Upstream(err.to_string())
    }
}

impl From<IdentityError> for OpsError {
    fn from(err: IdentityError) -> Self {
        OpsError::Upstream(err.to_string())
    }
}

impl From<ClusterResolveError> for OpsError {
    fn from(err: ClusterResolveError) -> Self {
        OpsError::NotFound(err.to_string())
    }
}

impl From<QuotaCommandError> for OpsError {
    fn from(err: QuotaCommandError) -> Self {
        OpsError::Validation(err.to_string())
    }
}
