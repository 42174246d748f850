//! Key-value store with AEAD-sealed values (spec §6).
//!
//! Backed by a flat JSON file of `key -> sealed-blob` pairs; each value is
//! sealed independently with [`crate::secrets::crypto::Seal`] so that
//! compromising one entry does not expose the others' plaintext without the
//! passphrase.

use super::crypto::Seal;
use super::{missing, SecretsProvider};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

pub struct KvAeadProvider {
    seal: Seal,
    entries: HashMap<String, String>,
}

impl KvAeadProvider {
    /// Load a store file of `{"key": "<sealed blob>"}` JSON entries.
    pub async fn load(path: &Path, password: impl Into<String>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io(format!("reading secrets store '{}'", path.display()), e))?;
        let entries: HashMap<String, String> = serde_json::from_str(&raw)
            .map_err(|e| Error::Internal(format!("malformed secrets store: {e}")))?;
        Ok(Self {
            seal: Seal::new(password),
            entries,
        })
    }

    pub fn empty(password: impl Into<String>) -> Self {
        Self {
            seal: Seal::new(password),
            entries: HashMap::new(),
        }
    }

    /// Seal `value` under `key` and store it in-memory; used by the `spot
    /// vault` CLI command to build a store file before writing it to disk.
    pub fn set(&mut self, key: impl Into<String>, value: &str) -> Result<()> {
        let sealed = self.seal.seal(value)?;
        self.entries.insert(key.into(), sealed);
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.entries)
            .map_err(|e| Error::Internal(format!("failed to serialize secrets store: {e}")))
    }
}

#[async_trait]
impl SecretsProvider for KvAeadProvider {
    async fn get(&self, key: &str) -> Result<String> {
        let sealed = self
            .entries
            .get(key)
            .ok_or_else(|| missing(key, "not present in key-value store"))?;
        self.seal.open(sealed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_roundtrips() {
        let mut store = KvAeadProvider::empty("pw");
        store.set("db_password", "s3cr3t").unwrap();
        assert_eq!(store.get("db_password").await.unwrap(), "s3cr3t");
    }

    #[tokio::test]
    async fn missing_key_errors() {
        let store = KvAeadProvider::empty("pw");
        assert!(store.get("nope").await.is_err());
    }
}
