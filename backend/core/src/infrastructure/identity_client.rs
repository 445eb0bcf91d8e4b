// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Identity Directory Client
//!
//! Implements [`IdentityProvider`] against the LDAP-fronting user listing
//! (`GET /api/v1/ldap/users?paging=false`) exposed next to the Slurm REST
//! gateway. The endpoint answers with the paginated envelope
//! `{count, results: [ {attr: value, ...} ], detail}`.

use crate::domain::quota_source::{IdentityError, IdentityProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const LDAP_USERS_PATH: &str = "/api/v1/ldap/users";

/// Attributes that may carry the login name, in order of preference.
pub const USER_NAME_KEYS: [&str; 4] = ["uid", "name", "UID", "User"];

/// One directory entry. Known attributes are typed; everything else is kept
/// in `extra`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LdapUser {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "UID", default)]
    pub uid_upper: Option<String>,
    #[serde(rename = "User", default)]
    pub user: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl LdapUser {
    /// First non-blank of `uid`, `name`, `UID`, `User`.
    pub fn login(&self) -> Option<&str> {
        [&self.uid, &self.name, &self.uid_upper, &self.user]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .map(str::trim)
            .find(|v| !v.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct UserListEnvelope {
    #[serde(default)]
    results: Vec<LdapUser>,
    #[serde(default)]
    detail: String,
}

#[derive(Clone)]
pub struct IdentityClient {
    client: Client,
}

impl IdentityClient {
    pub fn new(timeout: Duration) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl IdentityProvider for IdentityClient {
    async fn list_users(&self, addr: &str) -> Result<Vec<String>, IdentityError> {
        let url = format!("http://{}{}", addr.trim(), LDAP_USERS_PATH);
        debug!(addr, "Fetching directory users");

        let response = self
            .client
            .get(&url)
            .query(&[("paging", "false")])
            .send()
            .await
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| IdentityError::Network(e.to_string()))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<UserListEnvelope>(&body)
                .ok()
                .map(|e| e.detail)
                .filter(|d| !d.is_empty())
                .unwrap_or(body);
            return Err(IdentityError::Status {
                status: status.as_u16(),
                detail,
            });
        }

        let envelope: UserListEnvelope =
            serde_json::from_str(&body).map_err(|e| IdentityError::Decode(e.to_string()))?;

        Ok(envelope
            .results
            .iter()
            .filter_map(LdapUser::login)
            .map(str::to_string)
            .collect())
    }
}
