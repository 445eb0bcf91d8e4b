// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Lustre Quota Value Objects
//!
//! Value objects describing Lustre quota limits as they travel between the
//! command-execution service, the application store and the dashboard.
//!
//! The backend reports an unset limit either as an empty string or as the
//! literal `"none"` (any case, surrounding whitespace ignored). That sentinel
//! is parsed exactly once, at deserialization time, into
//! [`LimitValue::Unset`]; nothing downstream compares strings against
//! `"none"` again.
//!
//! ## Fallback policy
//!
//! Resolution is **per field**, not per record: a user may carry an explicit
//! block hard limit and still inherit the filesystem default's inode soft
//! limit. See [`QuotaLimitSet::resolve`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Sentinel used by the Lustre tooling for "no explicit limit".
pub const NONE_SENTINEL: &str = "none";

// ============================================================================
// LimitValue
// ============================================================================

/// A single quota limit, either set to a backend-formatted value
/// (`"10G"`, `"5000"`, `"1w"`) or unset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum LimitValue {
    #[default]
    Unset,
    Set(String),
}

impl LimitValue {
    /// Parse a raw backend/API string. Empty and `"none"` become `Unset`;
    /// anything else is kept trimmed.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NONE_SENTINEL) {
            Self::Unset
        } else {
            Self::Set(trimmed.to_string())
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Set(_))
    }

    pub fn as_deref(&self) -> Option<&str> {
        match self {
            Self::Set(value) => Some(value.as_str()),
            Self::Unset => None,
        }
    }

    /// This value if set, otherwise `fallback`.
    pub fn or_else_from(&self, fallback: &LimitValue) -> LimitValue {
        match self {
            Self::Set(_) => self.clone(),
            Self::Unset => fallback.clone(),
        }
    }
}

impl From<&str> for LimitValue {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl fmt::Display for LimitValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_deref().unwrap_or(""))
    }
}

impl Serialize for LimitValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_deref().unwrap_or(""))
    }
}

impl<'de> Deserialize<'de> for LimitValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(LimitValue::parse).unwrap_or_default())
    }
}

/// Resolve one limit field: the user's value when set, otherwise the
/// default's value when set, otherwise unset.
pub fn resolve_field(user: &LimitValue, default: &LimitValue) -> LimitValue {
    user.or_else_from(default)
}

// ============================================================================
// QuotaLimitSet
// ============================================================================

/// The six limits Lustre tracks per (identity, filesystem).
///
/// JSON field names are the ones the dashboard and the stored application
/// content have always used.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuotaLimitSet {
    #[serde(rename = "block_quota_soft_limit", default)]
    pub block_soft: LimitValue,

    #[serde(rename = "block_quota_hard_limit", default)]
    pub block_hard: LimitValue,

    #[serde(rename = "block_quota_grace", default)]
    pub block_grace: LimitValue,

    #[serde(rename = "file_quota_soft_limit", default)]
    pub file_soft: LimitValue,

    #[serde(rename = "file_quota_hard_limit", default)]
    pub file_hard: LimitValue,

    #[serde(rename = "file_quota_grace", default)]
    pub file_grace: LimitValue,
}

impl QuotaLimitSet {
    /// Per-field fallback from `self` (the user's limits) to `default`.
    pub fn resolve(&self, default: &QuotaLimitSet) -> QuotaLimitSet {
        QuotaLimitSet {
            block_soft: resolve_field(&self.block_soft, &default.block_soft),
            block_hard: resolve_field(&self.block_hard, &default.block_hard),
            block_grace: resolve_field(&self.block_grace, &default.block_grace),
            file_soft: resolve_field(&self.file_soft, &default.file_soft),
            file_hard: resolve_field(&self.file_hard, &default.file_hard),
            file_grace: resolve_field(&self.file_grace, &default.file_grace),
        }
    }

    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        !self.has_limits() && !self.has_grace()
    }

    /// True when at least one of the four soft/hard limits is set.
    pub fn has_limits(&self) -> bool {
        self.block_soft.is_set()
            || self.block_hard.is_set()
            || self.file_soft.is_set()
            || self.file_hard.is_set()
    }

    pub fn has_grace(&self) -> bool {
        self.block_grace.is_set() || self.file_grace.is_set()
    }
}

// ============================================================================
// MountPoint
// ============================================================================

/// Path at which a Lustre filesystem is mounted, e.g. `/mnt/lustre`.
///
/// Discovered per aggregation call, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MountPoint(String);

impl MountPoint {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MountPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MountPoint {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

// ============================================================================
// UserQuota
// ============================================================================

/// Quota limits of one user on one filesystem.
///
/// Used for live reads from the command-execution service (where `user` may be
/// empty for a filesystem default), for the aggregated view returned to the
/// dashboard, and as the content of a quota application.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserQuota {
    #[serde(default)]
    pub user: String,

    #[serde(rename = "filesystem", default)]
    pub filesystem: String,

    #[serde(flatten)]
    pub limits: QuotaLimitSet,
}

impl UserQuota {
    pub fn new(user: impl Into<String>, filesystem: impl Into<String>, limits: QuotaLimitSet) -> Self {
        Self {
            user: user.into(),
            filesystem: filesystem.into(),
            limits,
        }
    }

    /// Merge a live user read with the filesystem default.
    ///
    /// Limits fall back per field. The filesystem name falls back from the
    /// user read, to the default read, to the mount identifier itself.
    /// Either read may be absent (lookup failed or returned nothing).
    pub fn reconciled(
        user: &str,
        mount: &MountPoint,
        user_read: Option<&UserQuota>,
        default_read: Option<&UserQuota>,
    ) -> UserQuota {
        let empty = QuotaLimitSet::default();
        let user_limits = user_read.map(|q| &q.limits).unwrap_or(&empty);
        let default_limits = default_read.map(|q| &q.limits).unwrap_or(&empty);

        let filesystem = [
            user_read.map(|q| q.filesystem.as_str()),
            default_read.map(|q| q.filesystem.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|name| !name.is_empty())
        .unwrap_or(mount.as_str())
        .to_string();

        UserQuota {
            user: user.to_string(),
            filesystem,
            limits: user_limits.resolve(default_limits),
        }
    }
}
