//! Connector: produces per-host [`crate::executor::Executor`] sessions
//! (spec §4.2).

pub mod auth_prompt;
pub mod bastion;
pub mod ssh;

pub use auth_prompt::{AuthPrompt, TerminalAuthPrompt};

use crate::error::Result;
use crate::executor::Executor;
use crate::inventory::Destination;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Authentication material shared by every host a [`Connector`] dials.
#[derive(Debug, Clone, Default)]
pub struct ConnectorConfig {
    pub key_path: Option<PathBuf>,
    pub use_agent: bool,
    pub timeout_secs: u64,
    /// `ProxyCommand`-style bastion template containing `%h`/`%p`.
    pub proxy_command: Option<String>,
}

impl ConnectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.key_path.is_none() && !self.use_agent {
            return Err(crate::error::Error::Internal(
                "no authentication available: specify a key file or enable agent forwarding"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Public contract: `connect(ctx, host) -> Executor` (spec §4.2).
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        ctx: CancellationToken,
        dest: &Destination,
    ) -> Result<Box<dyn Executor>>;
}
