//! Encrypted-YAML-file secrets provider (spec §6).
//!
//! The whole file is one [`Seal`]ed blob of plaintext YAML `key: value`
//! pairs — the ansible-vault-style model, as opposed to
//! [`super::kv_aead`]'s per-value sealing.

use super::crypto::Seal;
use super::{missing, SecretsProvider};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

pub struct EncryptedYamlProvider {
    values: HashMap<String, String>,
}

impl EncryptedYamlProvider {
    pub async fn load(path: &Path, password: impl Into<String>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io(format!("reading vault file '{}'", path.display()), e))?;
        let plaintext = Seal::new(password).open(&raw)?;
        let values: HashMap<String, String> = serde_yaml::from_str(&plaintext)
            .map_err(|e| Error::Internal(format!("malformed decrypted secrets file: {e}")))?;
        Ok(Self { values })
    }

    /// Encrypt `plaintext_yaml` (a `key: value` document) for writing to
    /// disk. Used by the `spot vault encrypt` CLI command.
    pub fn encrypt_document(password: &str, plaintext_yaml: &str) -> Result<String> {
        Seal::new(password).seal(plaintext_yaml)
    }

    pub fn decrypt_document(password: &str, ciphertext: &str) -> Result<String> {
        Seal::new(password).open(ciphertext)
    }
}

#[async_trait]
impl SecretsProvider for EncryptedYamlProvider {
    async fn get(&self, key: &str) -> Result<String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| missing(key, "not present in encrypted secrets file"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_document_roundtrips() {
        let plaintext = "db_password: s3cr3t\napi_key: abc123\n";
        let sealed = EncryptedYamlProvider::encrypt_document("pw", plaintext).unwrap();
        let opened = EncryptedYamlProvider::decrypt_document("pw", &sealed).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[tokio::test]
    async fn load_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.yml.enc");
        let sealed =
            EncryptedYamlProvider::encrypt_document("pw", "db_password: s3cr3t\n").unwrap();
        tokio::fs::write(&path, sealed).await.unwrap();

        let provider = EncryptedYamlProvider::load(&path, "pw").await.unwrap();
        assert_eq!(provider.get("db_password").await.unwrap(), "s3cr3t");
        assert!(provider.get("missing").await.is_err());
    }
}
