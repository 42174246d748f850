//! The `none` provider: returns an error on any `get` (spec §6).

use super::{missing, SecretsProvider};
use crate::error::Result;
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct NoneProvider;

#[async_trait]
impl SecretsProvider for NoneProvider {
    async fn get(&self, key: &str) -> Result<String> {
        Err(missing(key, "no secrets provider configured"))
    }
}
