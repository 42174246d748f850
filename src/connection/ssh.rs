//! Real SSH [`Connector`], grounded on the teacher's `connection::russh`
//! module. Host-key checking is intentionally insecure-accept-any per
//! spec §4.2 step 4's documented non-goal.

use super::bastion::ProxyTransport;
use super::{AuthPrompt, Connector, ConnectorConfig};
use crate::error::{Error, Result};
use crate::executor::{Executor, SshExecutor};
use crate::inventory::Destination;
use async_trait::async_trait;
use russh::client::{Handle, Handler};
use russh_keys::load_secret_key;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Accepts any server host key; strict host-key validation is a
/// documented non-goal (spec §4.2 step 4).
pub struct ClientHandler;

#[async_trait]
impl Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &russh_keys::key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        Ok(true)
    }
}

pub struct SshConnector {
    config: ConnectorConfig,
    auth_prompt: Arc<dyn AuthPrompt>,
}

impl SshConnector {
    pub fn new(config: ConnectorConfig, auth_prompt: Arc<dyn AuthPrompt>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, auth_prompt })
    }

    async fn authenticate(&self, session: &mut Handle<ClientHandler>, user: &str) -> Result<()> {
        if let Some(key_path) = &self.config.key_path {
            let expanded = shellexpand::tilde(&key_path.to_string_lossy()).to_string();
            let key_pair = match load_secret_key(&expanded, None) {
                Ok(k) => k,
                Err(_) => {
                    let passphrase = self.auth_prompt.prompt_passphrase(&expanded);
                    load_secret_key(&expanded, passphrase.as_deref()).map_err(|e| {
                        Error::connect(user, format!("failed to load private key '{expanded}': {e}"))
                    })?
                }
            };
            let ok = session
                .authenticate_publickey(user, Arc::new(key_pair))
                .await
                .map_err(|e| Error::connect(user, format!("public key authentication failed: {e}")))?;
            if ok {
                return Ok(());
            }
        }

        if self.config.use_agent {
            let mut agent = russh_keys::agent::client::AgentClient::connect_env()
                .await
                .map_err(|e| Error::connect(user, format!("failed to connect to ssh-agent: {e}")))?;
            let identities = agent
                .request_identities()
                .await
                .map_err(|e| Error::connect(user, format!("failed to list agent identities: {e}")))?;
            for identity in identities {
                let (returned_agent, result) =
                    session.authenticate_future(user, identity, agent).await;
                agent = returned_agent;
                if matches!(result, Ok(true)) {
                    return Ok(());
                }
            }
        }

        Err(Error::connect(user, "all authentication methods failed"))
    }
}

#[async_trait]
impl Connector for SshConnector {
    async fn connect(
        &self,
        ctx: CancellationToken,
        dest: &Destination,
    ) -> Result<Box<dyn Executor>> {
        let user = dest.user.clone().unwrap_or_else(|| "root".to_string());
        let timeout = Duration::from_secs(self.config.timeout_secs.max(1));
        let russh_config = Arc::new(russh::client::Config {
            inactivity_timeout: Some(timeout),
            ..Default::default()
        });

        let connect_future = async {
            let mut session = if let Some(template) = &self.config.proxy_command {
                let transport = ProxyTransport::spawn(template, &dest.host, dest.port)?;
                russh::client::connect_stream(russh_config, transport, ClientHandler)
                    .await
                    .map_err(|e| Error::connect(&dest.label(), format!("SSH handshake failed: {e}")))?
            } else {
                russh::client::connect(russh_config, (dest.host.as_str(), dest.port), ClientHandler)
                    .await
                    .map_err(|e| Error::connect(&dest.label(), format!("SSH handshake failed: {e}")))?
            };

            self.authenticate(&mut session, &user).await?;
            Ok::<_, Error>(session)
        };

        let session = tokio::select! {
            biased;
            _ = ctx.cancelled() => return Err(Error::Canceled { host: dest.label() }),
            result = tokio::time::timeout(timeout, connect_future) => {
                result.map_err(|_| Error::Timeout {
                    host: dest.label(),
                    timeout_secs: self.config.timeout_secs,
                    message: "SSH dial/handshake timed out".to_string(),
                })??
            }
        };

        Ok(Box::new(SshExecutor::new(dest.label(), session)))
    }
}
