// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Quota Application Aggregate
//!
//! A persisted, reviewable request to change a user's quota limits.
//!
//! ## State Machine
//!
//! ```text
//!            create / update
//!                  │
//!                  ▼
//!             ┌──────────┐   review(approve=false)   ┌──────────┐
//!             │REVIEWING │──────────────────────────▶│ REJECTED │
//!             └──────────┘                           └──────────┘
//!                  │ review(approve=true)
//!                  ▼
//!             ┌──────────┐
//!             │  PASSED  │
//!             └──────────┘
//! ```
//!
//! `update` moves any state back to `REVIEWING`. `PASSED_UNSUCCESS` exists in
//! the stored enumeration but no review path writes it.
//!
//! The `applications` table is shared with other application classes; this
//! crate only reads and writes rows of class `lustre`.

use crate::domain::quota::UserQuota;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary key of the `applications` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(pub i64);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Review state, stored as an integer. The numeric values are shared with
/// other consumers of the table and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplicationState {
    Rejected = 0,
    Passed = 1,
    Reviewing = 2,
    PassedUnsuccess = 3,
}

impl ApplicationState {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Rejected),
            1 => Some(Self::Passed),
            2 => Some(Self::Reviewing),
            3 => Some(Self::PassedUnsuccess),
            _ => None,
        }
    }

    /// Label rendered to API clients.
    pub fn label(self) -> &'static str {
        match self {
            Self::Rejected => "rejected",
            Self::Passed => "passed",
            Self::Reviewing => "reviewing",
            Self::PassedUnsuccess => "passed_unsuccess",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Reviewing)
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ApplicationState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Discriminator for the kinds of application sharing one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationClass {
    Lustre,
    Slurm,
}

impl ApplicationClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lustre => "lustre",
            Self::Slurm => "slurm",
        }
    }
}

impl fmt::Display for ApplicationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the `applications` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Application {
    pub id: ApplicationId,
    pub class: ApplicationClass,
    pub state: ApplicationState,
    pub applier: String,
    pub reviewer: Option<String>,
    pub apply_at: DateTime<Utc>,
    pub review_at: Option<DateTime<Utc>>,
    pub decision: Option<String>,
    /// Serialized [`UserQuota`]: the requested limits until review, the
    /// applied limits afterwards.
    pub content: serde_json::Value,
}

impl Application {
    pub fn quota(&self) -> Result<UserQuota, serde_json::Error> {
        serde_json::from_value(self.content.clone())
    }
}

/// Insert payload. State and `apply_at` are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewApplication {
    pub class: ApplicationClass,
    pub applier: String,
    pub content: serde_json::Value,
}

/// Outcome of a review, persisted atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub state: ApplicationState,
    pub decision: String,
    pub reviewer: Option<String>,
    pub content: serde_json::Value,
}

/// A quota application as returned to clients: the stored request next to
/// the quota currently in effect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaApplication {
    pub id: ApplicationId,
    pub state: ApplicationState,
    pub applier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer: Option<String>,
    pub apply_at: DateTime<Utc>,
    pub review_at: Option<DateTime<Utc>>,
    pub decision: String,
    pub apply: UserQuota,
    pub actual: UserQuota,
}
