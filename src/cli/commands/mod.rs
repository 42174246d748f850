//! Subcommand implementations (spec §6 CLI surface).

pub mod inventory;
pub mod run;
pub mod vault;

use crate::error::{Error, Result};
use crate::secrets::{
    CloudSecretsManagerProvider, EncryptedYamlProvider, KvAeadProvider, MemoryProvider, NoneProvider,
    SecretsProvider, VaultProvider,
};
use std::path::PathBuf;
use std::sync::Arc;

fn parse_env_pair(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) => Ok((k.to_string(), v.to_string())),
        None => Err(format!("expected key=value, got '{s}'")),
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Build the secrets provider named by `SPOT_SECRETS_PROVIDER` (spec §6
/// "`SPOT_SECRETS_*`"). Defaults to `none`.
pub async fn resolve_secrets_provider() -> Result<Arc<dyn SecretsProvider>> {
    match env_var("SPOT_SECRETS_PROVIDER").as_deref() {
        None | Some("none") => Ok(Arc::new(NoneProvider)),
        Some("memory") => Ok(Arc::new(MemoryProvider::new())),
        Some("kv") => {
            let path = env_var("SPOT_SECRETS_KV_PATH")
                .ok_or_else(|| Error::Internal("SPOT_SECRETS_KV_PATH is required for the kv provider".to_string()))?;
            let password = env_var("SPOT_SECRETS_KV_PASSWORD")
                .ok_or_else(|| Error::Internal("SPOT_SECRETS_KV_PASSWORD is required for the kv provider".to_string()))?;
            let provider = KvAeadProvider::load(&PathBuf::from(path), password).await?;
            Ok(Arc::new(provider))
        }
        Some("vault") => {
            let address = env_var("SPOT_SECRETS_VAULT_ADDR")
                .ok_or_else(|| Error::Internal("SPOT_SECRETS_VAULT_ADDR is required for the vault provider".to_string()))?;
            let token = env_var("SPOT_SECRETS_VAULT_TOKEN")
                .ok_or_else(|| Error::Internal("SPOT_SECRETS_VAULT_TOKEN is required for the vault provider".to_string()))?;
            let mount = env_var("SPOT_SECRETS_VAULT_MOUNT").unwrap_or_else(|| "secret".to_string());
            Ok(Arc::new(VaultProvider::new(address, token, mount)?))
        }
        Some("cloud") => {
            let base_url = env_var("SPOT_SECRETS_CLOUD_URL")
                .ok_or_else(|| Error::Internal("SPOT_SECRETS_CLOUD_URL is required for the cloud provider".to_string()))?;
            let token = env_var("SPOT_SECRETS_CLOUD_TOKEN")
                .ok_or_else(|| Error::Internal("SPOT_SECRETS_CLOUD_TOKEN is required for the cloud provider".to_string()))?;
            Ok(Arc::new(CloudSecretsManagerProvider::new(base_url, token)?))
        }
        Some("encrypted-yaml") => {
            let path = env_var("SPOT_SECRETS_FILE")
                .ok_or_else(|| Error::Internal("SPOT_SECRETS_FILE is required for the encrypted-yaml provider".to_string()))?;
            let password = env_var("SPOT_SECRETS_PASSWORD")
                .ok_or_else(|| Error::Internal("SPOT_SECRETS_PASSWORD is required for the encrypted-yaml provider".to_string()))?;
            let provider = EncryptedYamlProvider::load(&PathBuf::from(path), password).await?;
            Ok(Arc::new(provider))
        }
        Some(other) => Err(Error::Internal(format!("unknown secrets provider '{other}'"))),
    }
}
