//! Thin generic cloud secrets manager client (spec §6).
//!
//! Modeled as a bearer-token REST client returning `{"value": "..."}` for a
//! given key path — deliberately provider-agnostic so it can front AWS
//! Secrets Manager, GCP Secret Manager, etc. behind an API gateway without
//! pulling in a provider-specific SDK. A true cloud SDK integration is an
//! external-collaborator concern per spec §1's non-goals.

use super::{missing, SecretsProvider};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize)]
struct SecretResponse {
    value: String,
}

pub struct CloudSecretsManagerProvider {
    client: reqwest::Client,
    base_url: String,
    bearer_token: String,
}

impl CloudSecretsManagerProvider {
    pub fn new(base_url: impl Into<String>, bearer_token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build cloud secrets http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            bearer_token: bearer_token.into(),
        })
    }
}

#[async_trait]
impl SecretsProvider for CloudSecretsManagerProvider {
    async fn get(&self, key: &str) -> Result<String> {
        let url = format!("{}/secrets/{}", self.base_url.trim_end_matches('/'), key);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.bearer_token)
            .send()
            .await
            .map_err(|e| missing(key, format!("cloud secrets request failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(missing(key, format!("cloud secrets manager returned status {}", resp.status())));
        }
        resp.json::<SecretResponse>()
            .await
            .map(|r| r.value)
            .map_err(|e| missing(key, format!("cloud secrets response decode failed: {e}")))
    }
}
