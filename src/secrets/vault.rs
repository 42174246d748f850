//! Thin HashiCorp Vault KV v2 client (spec §6: "remote vault" provider).
//!
//! The full Vault wire protocol (AppRole login, lease renewal, KV v1/v2
//! auto-detection) is an external-collaborator concern per spec §1's
//! non-goals; this client covers the one path the core needs: token auth
//! plus a KV v2 read.

use super::{missing, SecretsProvider};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

pub struct VaultProvider {
    client: reqwest::Client,
    address: String,
    token: String,
    /// KV v2 mount path, e.g. `secret`. Keys are read as
    /// `{address}/v1/{mount}/data/{key}`.
    mount: String,
}

impl VaultProvider {
    pub fn new(address: impl Into<String>, token: impl Into<String>, mount: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build vault http client: {e}")))?;
        Ok(Self {
            client,
            address: address.into(),
            token: token.into(),
            mount: mount.into(),
        })
    }
}

#[async_trait]
impl SecretsProvider for VaultProvider {
    async fn get(&self, key: &str) -> Result<String> {
        let url = format!("{}/v1/{}/data/{}", self.address, self.mount, key);
        let resp = self
            .client
            .get(&url)
            .header("X-Vault-Token", &self.token)
            .send()
            .await
            .map_err(|e| missing(key, format!("vault request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(missing(key, format!("vault returned status {}", resp.status())));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| missing(key, format!("vault response decode failed: {e}")))?;
        body.pointer("/data/data/value")
            .and_then(Value::as_str)
            .map(|s| s.to_string())
            .ok_or_else(|| missing(key, "vault response missing data.data.value"))
    }
}
