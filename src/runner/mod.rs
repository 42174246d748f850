//! Runner: the scheduler and orchestrator (spec §4.4).

pub mod register;
pub mod script;

use crate::connection::Connector;
use crate::error::{Error, MultiError, Result};
use crate::executor::{sync, Executor, LocalExecutor, RunOutput};
use crate::inventory::Destination;
use crate::playbook::{Command, Playbook, SubstitutionContext, Verb};
use register::Register;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub only: Vec<String>,
    pub skip: Vec<String>,
    pub user: Option<String>,
    pub env: HashMap<String, String>,
}

#[derive(Debug, Default)]
pub struct RunResult {
    pub hosts: Vec<String>,
    pub commands: Vec<String>,
    pub vars: HashMap<String, String>,
    pub errors: MultiError,
}

pub struct Runner {
    playbook: Arc<Playbook>,
    connector: Arc<dyn Connector>,
    concurrency: usize,
    remote_temp_dir: String,
}

impl Runner {
    pub fn new(
        playbook: Arc<Playbook>,
        connector: Arc<dyn Connector>,
        concurrency: usize,
        remote_temp_dir: impl Into<String>,
    ) -> Self {
        Self {
            playbook,
            connector,
            concurrency: concurrency.max(1),
            remote_temp_dir: remote_temp_dir.into(),
        }
    }

    /// `Run(ctx, taskName, targetName) -> Result{Hosts, Commands, Vars, Errors}`
    /// (spec §4.4).
    pub async fn run(
        &self,
        ctx: CancellationToken,
        task_name: &str,
        target_name: &str,
        overrides: &RunOverrides,
    ) -> Result<RunResult> {
        let task = self
            .playbook
            .task(task_name)
            .ok_or_else(|| Error::Internal(format!("unknown task '{task_name}'")))?
            .clone();
        let commands: Vec<Command> = task
            .filtered_commands(&overrides.only, &overrides.skip)
            .into_iter()
            .cloned()
            .collect();
        let command_names: Vec<String> = commands.iter().map(|c| c.name.clone()).collect();

        let hosts = self.playbook.resolve_run_targets(&task, target_name).await?;
        let host_labels: Vec<String> = hosts.iter().map(Destination::label).collect();

        let register = Arc::new(Register::new());
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set = tokio::task::JoinSet::new();

        for dest in hosts {
            let permit_sem = semaphore.clone();
            let connector = self.connector.clone();
            let task = task.clone();
            let commands = commands.clone();
            let register = register.clone();
            let user = overrides.user.clone();
            let env = overrides.env.clone();
            let remote_temp_dir = self.remote_temp_dir.clone();
            let ctx = ctx.clone();

            join_set.spawn(async move {
                let _permit = permit_sem.acquire_owned().await.expect("semaphore closed");
                let host_label = dest.label();
                let result = run_host(
                    ctx,
                    connector.as_ref(),
                    &dest,
                    &task,
                    &commands,
                    &user,
                    &env,
                    &remote_temp_dir,
                    register.as_ref(),
                )
                .await;
                (host_label, result)
            });
        }

        let mut errors = MultiError::new();
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((host_label, Ok(()))) => info!(host = %host_label, "task completed"),
                Ok((host_label, Err(e))) => errors.push(host_label, e),
                Err(join_err) => errors.push("<unknown>".to_string(), Error::Internal(join_err.to_string())),
            }
        }

        let vars = register.snapshot().await;
        self.playbook.update_tasks_targets(&vars).await;

        Ok(RunResult { hosts: host_labels, commands: command_names, vars, errors })
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_host(
    ctx: CancellationToken,
    connector: &dyn Connector,
    dest: &Destination,
    task: &crate::playbook::Task,
    commands: &[Command],
    override_user: &Option<String>,
    override_env: &HashMap<String, String>,
    remote_temp_dir: &str,
    register: &Register,
) -> Result<()> {
    let mut remote = connector.connect(ctx.clone(), dest).await?;
    let mut local = LocalExecutor::new(dest.label());
    let host_label = dest.label();
    let candidates = [dest.label(), dest.host.clone(), dest.name.clone().unwrap_or_default()];
    let candidate_refs: Vec<&str> = candidates.iter().map(String::as_str).collect();

    let run_result = run_commands(
        ctx.clone(),
        remote.as_mut(),
        &mut local,
        dest,
        task,
        commands,
        override_user,
        override_env,
        remote_temp_dir,
        register,
        &candidate_refs,
    )
    .await;

    let _ = remote.close().await;

    if let Err(e) = &run_result {
        if e.triggers_on_error() {
            if let Some(on_error) = &task.on_error {
                let sub = SubstitutionContext {
                    remote_host: dest.host.clone(),
                    remote_name: dest.name.clone().unwrap_or_default(),
                    remote_user: dest.user.clone().unwrap_or_default(),
                    command: String::new(),
                    task: task.name.clone(),
                    error: Some(e.to_string()),
                    register: register.snapshot().await,
                };
                let hook = sub.apply(on_error);
                warn!(host = %host_label, "running on_error hook");
                let _ = local.run(ctx.clone(), &hook).await;
            }
        }
    }

    run_result
}

#[allow(clippy::too_many_arguments)]
async fn run_commands(
    ctx: CancellationToken,
    remote: &mut dyn Executor,
    local: &mut LocalExecutor,
    dest: &Destination,
    task: &crate::playbook::Task,
    commands: &[Command],
    override_user: &Option<String>,
    override_env: &HashMap<String, String>,
    remote_temp_dir: &str,
    register: &Register,
    candidates: &[&str],
) -> Result<()> {
    let user = override_user
        .clone()
        .or_else(|| task.user.clone())
        .or_else(|| dest.user.clone())
        .unwrap_or_default();

    for cmd in commands {
        if ctx.is_cancelled() {
            return Err(Error::Canceled { host: dest.label() });
        }
        if !cmd.options.host_allowed(candidates) {
            continue;
        }

        let register_snapshot = register.snapshot().await;
        let sub = SubstitutionContext {
            remote_host: dest.host.clone(),
            remote_name: dest.name.clone().unwrap_or_default(),
            remote_user: user.clone(),
            command: cmd.name.clone(),
            task: task.name.clone(),
            error: None,
            register: register_snapshot,
        };
        let cmd = sub.substitute_command(cmd);

        let executor: &mut dyn Executor = if cmd.options.local { local } else { remote };

        if let Some(condition) = &cmd.condition {
            let (negate, expr) = condition
                .strip_prefix('!')
                .map(|e| (true, e))
                .unwrap_or((false, condition.as_str()));
            let probe = executor.run(ctx.clone(), &format!("sh -c {}", shell_quote(expr))).await;
            let passed = match probe {
                Ok(out) => out.success(),
                Err(_) => false,
            };
            let should_run = if negate { !passed } else { passed };
            if !should_run {
                continue;
            }
        }

        let mut env: HashMap<String, String> = override_env.clone();
        env.extend(cmd.env.clone());
        env.extend(cmd.secrets.clone());

        let outcome = dispatch(executor, ctx.clone(), &cmd, &env, remote_temp_dir).await;

        match outcome {
            Ok(Some(output)) => {
                if !cmd.register.is_empty() {
                    let captured = script::parse_setvar_lines(&output.stdout_lines);
                    if captured.is_empty() {
                        let joined = output.stdout_lines.join("\n");
                        let mut vars = HashMap::new();
                        vars.insert(cmd.register[0].clone(), joined);
                        register.merge(&vars).await;
                    } else {
                        register.merge(&captured).await;
                    }
                }
            }
            Ok(None) => {}
            Err(e) => {
                if cmd.options.ignore_errors {
                    warn!(host = %dest.label(), command = %cmd.name, error = %e, "ignoring command failure");
                    continue;
                }
                return Err(e);
            }
        }
    }

    Ok(())
}

async fn dispatch(
    executor: &mut dyn Executor,
    ctx: CancellationToken,
    cmd: &Command,
    env: &HashMap<String, String>,
    remote_temp_dir: &str,
) -> Result<Option<RunOutput>> {
    match &cmd.verb {
        Verb::Echo(text) => {
            crate::output::emit(executor.host_label(), text);
            Ok(None)
        }
        Verb::Script(body) => {
            let multiline = body.contains('\n') || !cmd.register.is_empty();
            if multiline {
                let script = script::build_script(env, body, &cmd.register);
                let out =
                    script::run_remote_script(executor, ctx, remote_temp_dir, &script, cmd.options.sudo)
                        .await?;
                check_exit(executor.host_label(), &cmd.name, &out)?;
                Ok(Some(out))
            } else {
                let prefix: String = env
                    .iter()
                    .map(|(k, v)| format!("{k}={} ", shell_quote(v)))
                    .collect();
                let line = format!("{prefix}{body}");
                let line = if cmd.options.sudo {
                    format!("sudo -n sh -c {}", shell_quote(&line))
                } else {
                    line
                };
                let out = executor.run(ctx, &line).await?;
                check_exit(executor.host_label(), &cmd.name, &out)?;
                Ok(Some(out))
            }
        }
        Verb::Copy(items) => {
            for spec in items {
                copy_one(executor, spec).await?;
            }
            Ok(None)
        }
        Verb::Sync(items) => {
            let mut last = Vec::new();
            for spec in items {
                last = sync_one(executor, spec).await?;
            }
            let mut out = RunOutput::default();
            out.stdout_lines = last;
            Ok(Some(out))
        }
        Verb::Delete(spec) => {
            executor.delete(Path::new(&spec.path), spec.recursive).await?;
            Ok(None)
        }
        Verb::Wait(spec) => {
            wait_for(executor, ctx, spec).await?;
            Ok(None)
        }
    }
}

fn check_exit(host: &str, command: &str, out: &RunOutput) -> Result<()> {
    if out.success() {
        Ok(())
    } else {
        Err(Error::exec(host, command, Some(out.exit_code), out.stderr.clone()))
    }
}

async fn copy_one(executor: &mut dyn Executor, spec: &crate::playbook::CopySpec) -> Result<()> {
    let dst = Path::new(&spec.dst);
    let matches: Vec<std::path::PathBuf> = glob::glob(&spec.src)
        .map_err(|e| Error::Internal(format!("invalid copy glob '{}': {e}", spec.src)))?
        .filter_map(|r| r.ok())
        .collect();
    let matches = if matches.is_empty() { vec![std::path::PathBuf::from(&spec.src)] } else { matches };

    for local_path in matches {
        let remote_path = if spec.src.contains('*') || spec.src.contains('?') {
            let filename = local_path
                .file_name()
                .ok_or_else(|| Error::Internal("copy source has no filename".to_string()))?;
            dst.join(filename)
        } else {
            dst.to_path_buf()
        };

        if !spec.force {
            if let Some(parent) = remote_path.parent() {
                if let Ok(local_meta) = tokio::fs::metadata(&local_path).await {
                    if let Ok(remote_stats) = executor.remote_file_stats(parent).await {
                        let filename = remote_path.file_name().unwrap_or_default().to_string_lossy();
                        let matched = remote_stats.iter().find(|(p, _, _)| {
                            Path::new(p).file_name().map(|f| f.to_string_lossy() == filename).unwrap_or(false)
                        });
                        if let Some((_, size, mtime)) = matched {
                            let local_mtime = local_meta
                                .modified()
                                .ok()
                                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                                .map(|d| d.as_secs() as i64)
                                .unwrap_or(0);
                            if *size == local_meta.len() && (local_mtime - mtime).abs() <= 1 {
                                continue;
                            }
                        }
                    }
                }
            }
        }

        executor.upload(&local_path, &remote_path, spec.mkdir).await?;
    }
    Ok(())
}

async fn sync_one(executor: &mut dyn Executor, spec: &crate::playbook::SyncSpec) -> Result<Vec<String>> {
    let local_dir = Path::new(&spec.src);
    let remote_dir = Path::new(&spec.dst);
    let excludes = sync::build_excludes(&spec.exclude)?;

    let local_stats = sync::local_file_stats(local_dir, &excludes)?;
    let remote_raw = executor.remote_file_stats(remote_dir).await?;
    let mut remote_stats = sync::FileStats::new();
    for (path, size, mtime) in remote_raw {
        remote_stats.insert(path, (size, mtime));
    }

    let plan = sync::plan(&local_stats, &remote_stats, &excludes);
    for path in &plan.updated {
        executor.upload(&local_dir.join(path), &remote_dir.join(path), true).await?;
    }
    if spec.delete {
        for path in &plan.deleted {
            executor.delete(&remote_dir.join(path), false).await?;
        }
    }
    Ok(plan.updated)
}

async fn wait_for(
    executor: &mut dyn Executor,
    ctx: CancellationToken,
    spec: &crate::playbook::WaitSpec,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(spec.timeout);
    loop {
        if ctx.is_cancelled() {
            return Err(Error::Canceled { host: executor.host_label().to_string() });
        }
        let probe = executor.run(ctx.clone(), &spec.cmd).await;
        if matches!(&probe, Ok(out) if out.success()) {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(Error::Timeout {
                host: executor.host_label().to_string(),
                timeout_secs: spec.timeout,
                message: format!("wait command '{}' did not succeed in time", spec.cmd),
            });
        }
        tokio::time::sleep(std::time::Duration::from_secs(spec.interval)).await;
    }
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playbook::CmdOptions;

    /// Records every command string passed to `run`, used to assert on the
    /// exact shape of what `dispatch` hands the executor (spec §3 `sudo`).
    struct RecordingExecutor {
        commands: Vec<String>,
    }

    #[async_trait::async_trait]
    impl Executor for RecordingExecutor {
        fn host_label(&self) -> &str {
            "h1"
        }

        async fn run(&mut self, _ctx: CancellationToken, cmd: &str) -> Result<RunOutput> {
            self.commands.push(cmd.to_string());
            Ok(RunOutput::default())
        }

        async fn upload(&mut self, _local: &Path, _remote: &Path, _mkdir: bool) -> Result<()> {
            Ok(())
        }

        async fn download(&mut self, _remote: &Path, _local: &Path, _mkdir: bool) -> Result<()> {
            Ok(())
        }

        async fn delete(&mut self, _remote: &Path, _recursive: bool) -> Result<()> {
            Ok(())
        }

        async fn find(&mut self, _root: &Path, _pattern: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn remote_file_stats(&mut self, _remote_dir: &Path) -> Result<Vec<(String, u64, i64)>> {
            Ok(Vec::new())
        }

        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn script_command(body: &str, sudo: bool) -> Command {
        Command {
            name: "c".to_string(),
            env: HashMap::new(),
            condition: None,
            register: Vec::new(),
            options: CmdOptions { sudo, ..Default::default() },
            verb: Verb::Script(body.to_string()),
            secrets: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn dispatch_wraps_single_line_script_in_sudo() {
        let mut executor = RecordingExecutor { commands: Vec::new() };
        let cmd = script_command("echo hi", true);
        dispatch(&mut executor, CancellationToken::new(), &cmd, &HashMap::new(), "/tmp")
            .await
            .unwrap();
        let run_cmd = executor.commands.last().expect("run() was called");
        assert!(run_cmd.starts_with("sudo -n sh -c"), "got {run_cmd:?}");
        assert!(run_cmd.contains("echo hi"));
    }

    #[tokio::test]
    async fn dispatch_does_not_wrap_without_sudo_option() {
        let mut executor = RecordingExecutor { commands: Vec::new() };
        let cmd = script_command("echo hi", false);
        dispatch(&mut executor, CancellationToken::new(), &cmd, &HashMap::new(), "/tmp")
            .await
            .unwrap();
        let run_cmd = executor.commands.last().expect("run() was called");
        assert_eq!(run_cmd, "echo hi");
    }
}
