// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Lustre Command-Execution Client
//!
//! HTTP adapter implementing [`QuotaSource`] against the cluster's Lustre
//! command-execution service.
//!
//! # API Endpoints
//!
//! - `GET  /api/lustre/execute_cmd?command=<cmd>` - read-only query
//! - `POST /api/lustre/execute_cmd` with `{"command": <cmd>}` - privileged
//!   control command
//!
//! Both respond with `{code, message, result}`. A call succeeds only with an
//! HTTP 2xx status **and** `code == 200`.
//!
//! # Commands
//!
//! | Operation | Command | `result` |
//! |-----------|---------|----------|
//! | mounts | `df -t lustre` | list of maps, mount point under `Mounted` |
//! | default quota | `lfs quota -U <mount>` | quota map |
//! | user quota | `lfs quota -u <user> <mount>` | quota map |
//!
//! Quota maps use the same keys as the `UserQuota` JSON representation.

use crate::domain::quota::{MountPoint, UserQuota};
use crate::domain::quota_command::validate_token;
use crate::domain::quota_source::{QuotaSource, QuotaSourceError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const EXECUTE_CMD_PATH: &str = "/api/lustre/execute_cmd";
const SUCCESS_CODE: i64 = 200;

pub const MOUNTS_COMMAND: &str = "df -t lustre";
/// Key of the mount point column in `df` results.
pub const MOUNTED_KEY: &str = "Mounted";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    result: Option<T>,
}

#[derive(Debug, Serialize)]
struct ControlRequest<'a> {
    command: &'a str,
}

/// Lustre command-execution service adapter
#[derive(Clone)]
pub struct LustreClient {
    client: Client,
}

impl LustreClient {
    /// Create a client whose every call is bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self, QuotaSourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QuotaSourceError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn endpoint(addr: &str) -> String {
        format!("http://{}{}", addr.trim(), EXECUTE_CMD_PATH)
    }

    async fn query<T: DeserializeOwned>(
        &self,
        addr: &str,
        command: &str,
    ) -> Result<Option<T>, QuotaSourceError> {
        debug!(addr, command, "Lustre query");
        let request = self
            .client
            .get(Self::endpoint(addr))
            .query(&[("command", command)]);
        Self::execute(request).await
    }

    async fn execute<T: DeserializeOwned>(request: RequestBuilder) -> Result<Option<T>, QuotaSourceError> {
        let response = request
            .send()
            .await
            .map_err(|e| QuotaSourceError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QuotaSourceError::Network(e.to_string()))?;
        let envelope = serde_json::from_str::<Envelope<T>>(&body);

        if !status.is_success() {
            // Prefer the service's own message when the body is an envelope.
            let detail = envelope
                .ok()
                .map(|e| e.message)
                .filter(|m| !m.is_empty())
                .unwrap_or(body);
            return Err(QuotaSourceError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let envelope = envelope.map_err(|e| QuotaSourceError::Decode(e.to_string()))?;
        if envelope.code != SUCCESS_CODE {
            return Err(QuotaSourceError::Rejected {
                code: envelope.code,
                message: envelope.message,
            });
        }
        Ok(envelope.result)
    }
}

fn checked(field: &'static str, value: &str) -> Result<(), QuotaSourceError> {
    validate_token(field, value).map_err(|e| QuotaSourceError::InvalidArgument(e.to_string()))
}

#[async_trait]
impl QuotaSource for LustreClient {
    async fn list_mounts(&self, addr: &str) -> Result<Vec<MountPoint>, QuotaSourceError> {
        let rows: Vec<HashMap<String, serde_json::Value>> =
            self.query(addr, MOUNTS_COMMAND).await?.unwrap_or_default();

        Ok(rows
            .iter()
            .filter_map(|row| row.get(MOUNTED_KEY).and_then(serde_json::Value::as_str))
            .map(str::trim)
            .filter(|mounted| !mounted.is_empty())
            .map(MountPoint::new)
            .collect())
    }

    async fn default_quota(
        &self,
        addr: &str,
        mount: &MountPoint,
    ) -> Result<Option<UserQuota>, QuotaSourceError> {
        checked("filesystem", mount.as_str())?;
        let command = format!("lfs quota -U {}", mount);
        self.query(addr, &command).await
    }

    async fn user_quota(
        &self,
        addr: &str,
        user: &str,
        mount: &MountPoint,
    ) -> Result<Option<UserQuota>, QuotaSourceError> {
        checked("user", user)?;
        checked("filesystem", mount.as_str())?;
        let command = format!("lfs quota -u {} {}", user, mount);
        self.query(addr, &command).await
    }

    async fn run(&self, addr: &str, command: &str) -> Result<(), QuotaSourceError> {
        debug!(addr, command, "Lustre control");
        let request = self
            .client
            .post(Self::endpoint(addr))
            .json(&ControlRequest { command });
        Self::execute::<serde_json::Value>(request).await.map(|_| ())
    }
}
