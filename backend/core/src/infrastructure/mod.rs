// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod cluster_registry;
pub mod db;
pub mod identity_client;
pub mod lustre_client;
pub mod repositories;

pub use cluster_registry::StaticClusterRegistry;
pub use identity_client::IdentityClient;
pub use lustre_client::LustreClient;
