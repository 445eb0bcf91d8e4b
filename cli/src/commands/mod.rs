// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the hpcops CLI

pub mod config;
pub mod db;
pub mod serve;

pub use self::config::ConfigCommand;
pub use self::db::DbCommand;
pub use self::serve::ServeCommand;
