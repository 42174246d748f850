//! `spot vault` — encrypt/decrypt an encrypted-YAML secrets file (spec §6,
//! grounded in the teacher's `vault` subcommand but delegating the actual
//! AEAD sealing to [`crate::secrets::encrypted_yaml::EncryptedYamlProvider`]).

use crate::error::Result;
use crate::secrets::EncryptedYamlProvider;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub struct VaultArgs {
    #[command(subcommand)]
    pub action: VaultAction,
}

#[derive(Subcommand, Debug)]
pub enum VaultAction {
    /// Encrypt a plaintext `key: value` YAML file in place (or to `--output`).
    Encrypt(VaultFileArgs),
    /// Decrypt an encrypted-YAML secrets file to stdout (or `--output`).
    Decrypt(VaultFileArgs),
}

#[derive(Parser, Debug)]
pub struct VaultFileArgs {
    pub file: PathBuf,

    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Vault password. Prompted interactively if omitted.
    #[arg(long, env = "SPOT_VAULT_PASSWORD")]
    pub password: Option<String>,
}

impl VaultArgs {
    pub async fn execute(&self) -> Result<i32> {
        match &self.action {
            VaultAction::Encrypt(args) => args.run(true).await,
            VaultAction::Decrypt(args) => args.run(false).await,
        }
    }
}

impl VaultFileArgs {
    async fn run(&self, encrypt: bool) -> Result<i32> {
        let password = self.resolve_password()?;
        let input = tokio::fs::read_to_string(&self.file)
            .await
            .map_err(|e| crate::error::Error::io(format!("reading '{}'", self.file.display()), e))?;

        let output = if encrypt {
            EncryptedYamlProvider::encrypt_document(&password, &input)?
        } else {
            EncryptedYamlProvider::decrypt_document(&password, &input)?
        };

        match &self.output {
            Some(path) => {
                tokio::fs::write(path, output)
                    .await
                    .map_err(|e| crate::error::Error::io(format!("writing '{}'", path.display()), e))?;
            }
            None if encrypt => {
                tokio::fs::write(&self.file, output)
                    .await
                    .map_err(|e| crate::error::Error::io(format!("writing '{}'", self.file.display()), e))?;
            }
            None => {
                let mut stdout = std::io::stdout();
                stdout
                    .write_all(output.as_bytes())
                    .map_err(|e| crate::error::Error::io("writing to stdout", e))?;
            }
        }
        Ok(0)
    }

    fn resolve_password(&self) -> Result<String> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        dialoguer::Password::with_theme(&dialoguer::theme::ColorfulTheme::default())
            .with_prompt("Vault password")
            .interact()
            .map_err(|e| crate::error::Error::Internal(format!("failed to read vault password: {e}")))
    }
}
