// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Lustre quota reconciliation and quota application review for the HPC
//! operations backend.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, services, adapters and HTTP API

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;
