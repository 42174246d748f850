//! Playbook: parser, resolver and substituter (spec §4.1).

pub mod command;
pub mod parse;
pub mod substitute;
pub mod target;
pub mod task;

pub use command::{CmdOptions, Command, CopySpec, DeleteSpec, SyncSpec, Verb, WaitSpec};
pub use substitute::SubstitutionContext;
pub use target::TargetSpec;
pub use task::Task;

use crate::error::{Error, Result};
use crate::inventory::{dedup_destinations, Destination, InventoryData};
use crate::secrets::SecretsProvider;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// CLI/env overrides applied on top of playbook fields (spec §4.1
/// "Override rules"). "CLI user/inventory always wins over playbook.
/// Environment-variable override loses to both."
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub user: Option<String>,
    pub inventory: Option<String>,
    pub env: HashMap<String, String>,
    /// A positional ad-hoc shell command, wrapped by the caller into a
    /// synthetic one-task playbook before `Playbook::load` is ever called.
    pub adhoc_command: Option<String>,
}

pub struct Playbook {
    pub user: Option<String>,
    pub ssh_key: Option<String>,
    pub inventory_location: Option<String>,
    pub targets: IndexMap<String, TargetSpec>,
    pub tasks: Vec<Task>,
    pub inventory: InventoryData,
    secrets: Arc<dyn SecretsProvider>,
    all_secret_values: Vec<String>,
    /// Cross-task registered-variable store, merged in by the Runner after
    /// each task completes (spec §4.4 "Dynamic targets").
    register: Arc<Mutex<HashMap<String, String>>>,
}

impl std::fmt::Debug for Playbook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Playbook")
            .field("user", &self.user)
            .field("ssh_key", &self.ssh_key)
            .field("inventory_location", &self.inventory_location)
            .field("targets", &self.targets)
            .field("tasks", &self.tasks)
            .field("inventory", &self.inventory)
            .finish_non_exhaustive()
    }
}

impl Playbook {
    pub async fn load(
        path: impl AsRef<Path>,
        overrides: &Overrides,
        secrets: Arc<dyn SecretsProvider>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io(format!("reading playbook '{}'", path.display()), e))?;
        let normalized = parse::decode(path, &raw)?;

        let mut seen_names = std::collections::HashSet::new();
        let mut tasks = Vec::with_capacity(normalized.tasks.len());
        for raw_task in normalized.tasks {
            let key = raw_task.name.to_lowercase();
            if !seen_names.insert(key) {
                return Err(Error::config(
                    path,
                    format!("duplicate task name '{}'", raw_task.name),
                ));
            }
            let task = raw_task
                .into_task()
                .map_err(|msg| Error::config(path, msg))?;
            tasks.push(task);
        }

        let user = overrides.user.clone().or(normalized.user);
        let inventory_location = overrides
            .inventory
            .clone()
            .or(normalized.inventory)
            .or_else(|| overrides.env.get("SPOT_INVENTORY").cloned());

        let inventory = match &inventory_location {
            Some(loc) => InventoryData::load(loc, user.as_deref()).await?,
            None => InventoryData::empty(),
        };

        let mut playbook = Self {
            user,
            ssh_key: normalized.ssh_key,
            inventory_location,
            targets: normalized.targets,
            tasks,
            inventory,
            secrets,
            all_secret_values: Vec::new(),
            register: Arc::new(Mutex::new(HashMap::new())),
        };

        playbook.resolve_secrets(path).await?;
        Ok(playbook)
    }

    /// Populate `Command.secrets` for every command listing
    /// `options.secrets` keys, failing fast on an unresolved key (spec
    /// §4.1 "Secrets").
    async fn resolve_secrets(&mut self, path: &Path) -> Result<()> {
        for task in &mut self.tasks {
            for cmd in &mut task.commands {
                for key in cmd.options.secrets.clone() {
                    let value = self.secrets.get(&key).await.map_err(|e| {
                        Error::config(path, format!("secret '{key}' unresolved: {e}"))
                    })?;
                    self.all_secret_values.push(value.clone());
                    cmd.secrets.insert(key, value);
                }
            }
        }
        Ok(())
    }

    /// Values never to be logged in plaintext (spec §3 invariant).
    pub fn all_secret_values(&self) -> &[String] {
        &self.all_secret_values
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Merge task-completion exports into the cross-task register
    /// (last-writer-wins across hosts) and make them visible to subsequent
    /// `target_hosts` resolutions (spec §4.4 "Dynamic targets").
    pub async fn update_tasks_targets(&self, vars: &HashMap<String, String>) {
        let mut register = self.register.lock().await;
        for (k, v) in vars {
            register.insert(k.clone(), v.clone());
        }
    }

    pub async fn register_snapshot(&self) -> HashMap<String, String> {
        self.register.lock().await.clone()
    }

    /// CLI sentinel meaning "no explicit `--target` was given" (spec §4.1
    /// Task: `targets` override "preferred over CLI targets when the CLI
    /// target is the default"; spec §8 scenario C runs task 1 "on target
    /// `default`").
    pub const DEFAULT_TARGET: &'static str = "default";

    /// Resolve the hosts a task actually runs against. A task's own
    /// `targets` override takes priority over the caller-supplied target
    /// name when that name is the CLI default; otherwise `cli_target` is
    /// resolved as given.
    pub async fn resolve_run_targets(&self, task: &Task, cli_target: &str) -> Result<Vec<Destination>> {
        if cli_target == Self::DEFAULT_TARGET && !task.targets.is_empty() {
            let mut out = Vec::new();
            for name in &task.targets {
                out.extend(self.target_hosts(name).await?);
            }
            return Ok(dedup_destinations(out));
        }
        self.target_hosts(cli_target).await
    }

    /// Resolve a target name into a deduplicated host list, per the
    /// priority order in spec §4.1:
    /// 1. playbook target key (union of its variants)
    /// 2. inventory group
    /// 3. Destination name/host in `all`
    /// 4. `host[:port]` literal
    pub async fn target_hosts(&self, name: &str) -> Result<Vec<Destination>> {
        let register = self.register.lock().await.clone();
        let resolved_name = SubstitutionContext {
            register,
            ..Default::default()
        }
        .apply(name);

        if let Some(spec) = self.targets.get(&resolved_name) {
            return Ok(self.resolve_target_spec(spec));
        }
        if let Some(group) = self.inventory.group(&resolved_name) {
            return Ok(dedup_destinations(group.to_vec()));
        }
        if let Some(dest) = self.inventory.find_by_name_or_host(&resolved_name) {
            return Ok(vec![dest.clone()]);
        }
        Ok(vec![Destination::parse_host_port(
            &resolved_name,
            self.user.as_deref(),
        )])
    }

    fn resolve_target_spec(&self, spec: &TargetSpec) -> Vec<Destination> {
        let mut out = Vec::new();
        out.extend(spec.hosts.iter().cloned());
        for group in &spec.groups {
            if let Some(dests) = self.inventory.group(group) {
                out.extend(dests.iter().cloned());
            }
        }
        if !spec.tags.is_empty() {
            out.extend(
                self.inventory
                    .all()
                    .iter()
                    .filter(|d| spec.tags.iter().any(|t| d.tags.contains(t)))
                    .cloned(),
            );
        }
        if !spec.names.is_empty() {
            out.extend(
                self.inventory
                    .all()
                    .iter()
                    .filter(|d| d.name.as_deref().map(|n| spec.names.iter().any(|x| x == n)).unwrap_or(false))
                    .cloned(),
            );
        }
        dedup_destinations(out)
    }
}

/// Build a synthetic one-command, one-task playbook for an ad-hoc shell
/// command (spec §6 "Ad-hoc command").
pub fn adhoc_playbook_source(script: &str) -> String {
    format!(
        "tasks:\n  - name: ad-hoc\n    commands:\n      - name: ad-hoc\n        script: {:?}\n",
        script
    )
}

pub type PlaybookPath = PathBuf;
