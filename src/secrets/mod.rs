//! Secrets provider interface (spec §6) and local implementations.
//!
//! `Playbook` consumes providers only through the [`SecretsProvider`] trait;
//! the concrete backends enumerated in spec §6 — `none`, in-process memory,
//! an AEAD-sealed key-value store, a remote vault, a cloud secrets manager
//! and an encrypted-YAML file — all live behind it. Only `none`, `memory`,
//! the AEAD store and the encrypted-YAML file are fully self-contained; the
//! `vault` and `cloud` backends are thin HTTP clients sufficient to exercise
//! the same interface against a real endpoint.

pub mod cloud;
mod crypto;
pub mod encrypted_yaml;
pub mod kv_aead;
pub mod memory;
pub mod none;
pub mod vault;

use crate::error::{Error, Result};
use async_trait::async_trait;

/// `Get(key) -> (value, error)` from spec §6, expressed as a Rust trait.
#[async_trait]
pub trait SecretsProvider: Send + Sync {
    async fn get(&self, key: &str) -> Result<String>;
}

pub use cloud::CloudSecretsManagerProvider;
pub use encrypted_yaml::EncryptedYamlProvider;
pub use kv_aead::KvAeadProvider;
pub use memory::MemoryProvider;
pub use none::NoneProvider;
pub use vault::VaultProvider;

/// Helper used by providers to produce a consistently-shaped [`Error::Secret`].
pub(crate) fn missing(key: &str, message: impl Into<String>) -> Error {
    Error::Secret {
        key: key.to_string(),
        message: message.into(),
    }
}
