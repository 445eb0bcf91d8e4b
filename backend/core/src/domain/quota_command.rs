// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Lustre Quota Command Builder
//!
//! Pure translation of a [`QuotaLimitSet`] into the `lfs setquota` command
//! lines executed by the command-execution service.
//!
//! The produced strings are a wire contract: automation downstream of the
//! command-execution service parses them, so flag order is fixed
//! (`-b`, `-B`, `-i`, `-I`) and arguments are emitted unquoted. Every token
//! that lands in a command is checked by [`validate_token`] first.
//!
//! ```text
//! lfs setquota -u <user|0> [-b BSOFT] [-B BHARD] [-i ISOFT] [-I IHARD] <mount>
//! lfs setquota -t [-u 0] [--block-grace=X] [--inode-grace=Y] <mount>
//! ```

use crate::domain::quota::{LimitValue, QuotaLimitSet};
use thiserror::Error;

const LFS_SETQUOTA: [&str; 2] = ["lfs", "setquota"];

/// Identity placeholder Lustre uses for the filesystem-wide default quota.
pub const DEFAULT_QUOTA_ID: &str = "0";

/// Characters that must never appear in a command token.
const FORBIDDEN_CHARS: &[char] = &[
    '\'', '"', '`', '$', ';', '&', '|', '<', '>', '(', ')', '{', '}', '[', ']', '*', '?', '!',
    '~', '#', '\\',
];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuotaCommandError {
    #[error("no quota limits to update")]
    NothingToUpdate,

    #[error("{field} contains characters not allowed in a quota command: {value:?}")]
    InvalidToken { field: &'static str, value: String },
}

/// Whose quota a command targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaTarget {
    User(String),
    /// The mount's default quota (`-u 0`).
    Default,
}

impl QuotaTarget {
    fn id(&self) -> &str {
        match self {
            QuotaTarget::User(user) => user.as_str(),
            QuotaTarget::Default => DEFAULT_QUOTA_ID,
        }
    }
}

/// The commands needed to apply one quota change, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuotaCommandPlan {
    pub limits: Option<String>,
    pub grace: Option<String>,
}

impl QuotaCommandPlan {
    pub fn is_empty(&self) -> bool {
        self.limits.is_none() && self.grace.is_none()
    }

    /// Commands in the order they must run.
    pub fn commands(&self) -> impl Iterator<Item = &str> {
        self.limits.iter().chain(self.grace.iter()).map(String::as_str)
    }
}

/// Reject tokens that could change the meaning of a command line.
pub fn validate_token(field: &'static str, value: &str) -> Result<(), QuotaCommandError> {
    let unsafe_char = value
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || FORBIDDEN_CHARS.contains(&c));
    if value.is_empty() || unsafe_char || value.starts_with('-') {
        return Err(QuotaCommandError::InvalidToken {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn push_flag(
    parts: &mut Vec<String>,
    flag: &str,
    field: &'static str,
    value: &LimitValue,
) -> Result<bool, QuotaCommandError> {
    match value.as_deref() {
        Some(v) => {
            validate_token(field, v)?;
            parts.push(flag.to_string());
            parts.push(v.to_string());
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Build the block/inode limit command.
///
/// Returns [`QuotaCommandError::NothingToUpdate`] when none of the four
/// soft/hard limits is set.
pub fn limit_command(
    target: &QuotaTarget,
    limits: &QuotaLimitSet,
    mount: &str,
) -> Result<String, QuotaCommandError> {
    validate_token("user", target.id())?;
    validate_token("filesystem", mount)?;

    let mut parts: Vec<String> = LFS_SETQUOTA.iter().map(|s| s.to_string()).collect();
    parts.push("-u".to_string());
    parts.push(target.id().to_string());

    let mut any = false;
    any |= push_flag(&mut parts, "-b", "block_quota_soft_limit", &limits.block_soft)?;
    any |= push_flag(&mut parts, "-B", "block_quota_hard_limit", &limits.block_hard)?;
    any |= push_flag(&mut parts, "-i", "file_quota_soft_limit", &limits.file_soft)?;
    any |= push_flag(&mut parts, "-I", "file_quota_hard_limit", &limits.file_hard)?;

    if !any {
        return Err(QuotaCommandError::NothingToUpdate);
    }

    parts.push(mount.to_string());
    Ok(parts.join(" "))
}

/// Build the grace-period command, if any grace value is set.
///
/// Grace times in Lustre are per quota type rather than per identity, so only
/// the default target carries `-u 0`.
pub fn grace_command(
    target: &QuotaTarget,
    limits: &QuotaLimitSet,
    mount: &str,
) -> Result<Option<String>, QuotaCommandError> {
    if !limits.has_grace() {
        return Ok(None);
    }
    validate_token("filesystem", mount)?;

    let mut parts: Vec<String> = LFS_SETQUOTA.iter().map(|s| s.to_string()).collect();
    parts.push("-t".to_string());
    if *target == QuotaTarget::Default {
        parts.push("-u".to_string());
        parts.push(DEFAULT_QUOTA_ID.to_string());
    }
    if let Some(grace) = limits.block_grace.as_deref() {
        validate_token("block_quota_grace", grace)?;
        parts.push(format!("--block-grace={grace}"));
    }
    if let Some(grace) = limits.file_grace.as_deref() {
        validate_token("file_quota_grace", grace)?;
        parts.push(format!("--inode-grace={grace}"));
    }
    parts.push(mount.to_string());
    Ok(Some(parts.join(" ")))
}

/// Build every command needed for `limits`. An empty plan means there is
/// nothing to run.
pub fn plan(
    target: &QuotaTarget,
    limits: &QuotaLimitSet,
    mount: &str,
) -> Result<QuotaCommandPlan, QuotaCommandError> {
    let limits_cmd = match limit_command(target, limits, mount) {
        Ok(cmd) => Some(cmd),
        Err(QuotaCommandError::NothingToUpdate) => None,
        Err(e) => return Err(e),
    };
    let grace_cmd = grace_command(target, limits, mount)?;
    Ok(QuotaCommandPlan {
        limits: limits_cmd,
        grace: grace_cmd,
    })
}
