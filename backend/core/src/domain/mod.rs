// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Layer
//!
//! Pure business types and collaborator contracts. No I/O happens here;
//! infrastructure implements the traits declared in [`repository`] and
//! [`quota_source`].
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`quota`] | `LimitValue`, `QuotaLimitSet`, `UserQuota`, `MountPoint` |
//! | [`quota_command`] | `lfs setquota` command builder |
//! | [`application`] | Quota application aggregate and state machine |
//! | [`repository`] | `ApplicationRepository` contract |
//! | [`quota_source`] | Quota gateway, identity and cluster lookup contracts |
//! | [`paging`] | Page windows and links |
//! | [`error`] | `OpsError` taxonomy |
//! | [`node_config`] | Backend configuration manifest |

pub mod application;
pub mod error;
pub mod node_config;
pub mod paging;
pub mod quota;
pub mod quota_command;
pub mod quota_source;
pub mod repository;
