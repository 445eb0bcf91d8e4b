// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`hpcops-core`)
//!
//! HTTP surface that translates dashboard requests into application service
//! calls. No business logic lives here.
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | Lustre quota and quota application endpoints |

pub mod api;
