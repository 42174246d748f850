//! `spot run` — execute a task, or an ad-hoc shell command, against a target.

use super::{parse_env_pair, resolve_secrets_provider};
use crate::connection::{ConnectorConfig, TerminalAuthPrompt};
use crate::error::{Error, Result};
use crate::playbook::{adhoc_playbook_source, Overrides, Playbook};
use crate::runner::{RunOverrides, Runner};
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Playbook file (YAML or TOML). Omit when giving an ad-hoc command.
    #[arg(long)]
    pub playbook: Option<PathBuf>,

    /// Task name to run (mutually exclusive with a trailing ad-hoc command).
    #[arg(long)]
    pub task: Option<String>,

    /// Target name (host, group, tag or literal host:port). Repeatable;
    /// resolution is the union of every value given. Omitted, this is the
    /// `default` sentinel, which yields to a task's own `targets` override.
    #[arg(long = "target", action = clap::ArgAction::Append, default_value = Playbook::DEFAULT_TARGET)]
    pub targets: Vec<String>,

    /// Run only these commands within the task (overrides `no_auto`).
    #[arg(long = "only", action = clap::ArgAction::Append)]
    pub only: Vec<String>,

    /// Skip these commands within the task.
    #[arg(long = "skip", action = clap::ArgAction::Append)]
    pub skip: Vec<String>,

    /// Maximum number of hosts to run against concurrently.
    #[arg(long, default_value_t = 5)]
    pub concurrency: usize,

    /// Override the SSH user for every resolved host.
    #[arg(short = 'u', long)]
    pub user: Option<String>,

    /// Private key file used to authenticate.
    #[arg(long = "key")]
    pub ssh_key: Option<PathBuf>,

    /// Fall back to an ssh-agent if the key file fails or is absent.
    #[arg(long)]
    pub agent: bool,

    /// Connection timeout in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// `ProxyCommand`-style bastion template (`%h`/`%p` expanded).
    #[arg(long = "proxy-command")]
    pub proxy_command: Option<String>,

    /// Remote directory used to stage uploaded files and scripts.
    #[arg(long, default_value = "/tmp")]
    pub remote_temp_dir: String,

    /// Extra `key=value` pairs exported into every command's environment.
    #[arg(long = "env", value_parser = parse_env_pair, action = clap::ArgAction::Append)]
    pub env: Vec<(String, String)>,

    /// Override the inventory location (file path or `http(s)://` URL).
    #[arg(long)]
    pub inventory: Option<String>,

    /// Resolve targets and print the planned commands without connecting
    /// to any host.
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Ad-hoc shell command, run in place of `--task`. Everything after
    /// `--` is joined with spaces into a single shell command.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub adhoc: Vec<String>,
}

impl RunArgs {
    pub async fn execute(&self) -> Result<i32> {
        let env: HashMap<String, String> = self.env.iter().cloned().collect();
        let overrides = Overrides {
            user: self.user.clone(),
            inventory: self.inventory.clone(),
            env: env.clone(),
            adhoc_command: if self.adhoc.is_empty() {
                None
            } else {
                Some(self.adhoc.join(" "))
            },
        };

        let (playbook_path, _temp_guard) = self.resolve_playbook_path(&overrides)?;
        let task_name = if let Some(task) = &self.task {
            task.clone()
        } else if overrides.adhoc_command.is_some() {
            "ad-hoc".to_string()
        } else {
            return Err(Error::Internal("either --task or an ad-hoc command is required".to_string()));
        };

        let secrets = resolve_secrets_provider().await?;
        let playbook = Playbook::load(&playbook_path, &overrides, secrets).await?;
        crate::output::install_redactor(playbook.all_secret_values().to_vec());
        let playbook = Arc::new(playbook);

        if self.dry_run {
            return self.print_plan(&playbook, &task_name).await;
        }

        let connector_config = ConnectorConfig {
            key_path: self.ssh_key.clone(),
            use_agent: self.agent,
            timeout_secs: self.timeout,
            proxy_command: self.proxy_command.clone(),
        };
        let connector = crate::connection::ssh::SshConnector::new(connector_config, Arc::new(TerminalAuthPrompt))?;
        let runner = Runner::new(playbook, Arc::new(connector), self.concurrency, self.remote_temp_dir.clone());

        let run_overrides = RunOverrides {
            only: self.only.clone(),
            skip: self.skip.clone(),
            user: self.user.clone(),
            env,
        };

        let ctx = CancellationToken::new();
        let ctrl_c_ctx = ctx.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            ctrl_c_ctx.cancel();
        });

        for target in &self.targets {
            let result = runner.run(ctx.clone(), &task_name, target, &run_overrides).await?;
            if !result.errors.is_empty() {
                eprintln!("{}", result.errors.render("spot"));
                return Ok(1);
            }
        }
        Ok(0)
    }

    fn resolve_playbook_path(&self, overrides: &Overrides) -> Result<(PathBuf, Option<tempfile::TempDir>)> {
        if let Some(path) = &self.playbook {
            return Ok((path.clone(), None));
        }
        let script = overrides
            .adhoc_command
            .as_deref()
            .ok_or_else(|| Error::Internal("either --playbook or an ad-hoc command is required".to_string()))?;
        let dir = tempfile::tempdir().map_err(|e| Error::io("creating temp dir for ad-hoc playbook", e))?;
        let path = dir.path().join("adhoc.yml");
        std::fs::write(&path, adhoc_playbook_source(script)).map_err(|e| Error::io("writing ad-hoc playbook", e))?;
        Ok((path, Some(dir)))
    }

    async fn print_plan(&self, playbook: &Playbook, task_name: &str) -> Result<i32> {
        let task = playbook
            .task(task_name)
            .ok_or_else(|| Error::Internal(format!("unknown task '{task_name}'")))?;
        let commands = task.filtered_commands(&self.only, &self.skip);
        for target in &self.targets {
            let hosts = playbook.resolve_run_targets(task, target).await?;
            for host in &hosts {
                for command in &commands {
                    crate::output::emit(&host.label(), &format!("would run '{}'", command.name));
                }
            }
        }
        Ok(0)
    }
}
