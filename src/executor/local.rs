//! Local-machine [`Executor`]: used for `options.local` commands and for
//! `on_error` hooks, which always run on the operator's machine (spec
//! §4.4 step 4).

use super::{sync, Executor, RunOutput};
use crate::error::{Error, Result};
use std::path::Path;
use std::process::Stdio;
use tokio_util::sync::CancellationToken;

pub struct LocalExecutor {
    host_label: String,
}

impl LocalExecutor {
    pub fn new(host_label: impl Into<String>) -> Self {
        Self { host_label: host_label.into() }
    }
}

#[async_trait::async_trait]
impl Executor for LocalExecutor {
    fn host_label(&self) -> &str {
        &self.host_label
    }

    async fn run(&mut self, ctx: CancellationToken, cmd: &str) -> Result<RunOutput> {
        let mut child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(cmd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::exec(&self.host_label, cmd, None, format!("failed to spawn: {e}")))?;

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();

        let (stdout_bytes, stderr_bytes, status) = tokio::select! {
            biased;
            _ = ctx.cancelled() => {
                let _ = child.start_kill();
                return Err(Error::Canceled { host: self.host_label.clone() });
            }
            result = async {
                use tokio::io::AsyncReadExt;
                let mut stdout_buf = Vec::new();
                let mut stderr_buf = Vec::new();
                if let Some(mut s) = stdout_pipe.take() {
                    s.read_to_end(&mut stdout_buf).await?;
                }
                if let Some(mut s) = stderr_pipe.take() {
                    s.read_to_end(&mut stderr_buf).await?;
                }
                let status = child.wait().await?;
                Ok::<_, std::io::Error>((stdout_buf, stderr_buf, status))
            } => {
                result.map_err(|e| Error::exec(&self.host_label, cmd, None, format!("wait failed: {e}")))?
            }
        };

        let stdout = String::from_utf8_lossy(&stdout_bytes).to_string();
        let stderr = String::from_utf8_lossy(&stderr_bytes).to_string();
        for line in stdout.lines() {
            crate::output::emit(&self.host_label, line);
        }
        for line in stderr.lines() {
            crate::output::emit(&self.host_label, line);
        }

        Ok(RunOutput {
            stdout_lines: stdout.lines().map(str::to_string).filter(|l| !l.is_empty()).collect(),
            stderr,
            exit_code: status.code().unwrap_or(i32::MAX),
        })
    }

    async fn upload(&mut self, local_path: &Path, remote_path: &Path, mkdir: bool) -> Result<()> {
        if mkdir {
            if let Some(parent) = remote_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::io(format!("creating dir '{}'", parent.display()), e))?;
            }
        }
        tokio::fs::copy(local_path, remote_path)
            .await
            .map_err(|e| Error::Upload { host: self.host_label.clone(), message: e.to_string() })?;
        Ok(())
    }

    async fn download(&mut self, remote_path: &Path, local_path: &Path, mkdir: bool) -> Result<()> {
        self.upload(remote_path, local_path, mkdir).await.map_err(|e| match e {
            Error::Upload { host, message } => Error::Download { host, message },
            other => other,
        })
    }

    async fn delete(&mut self, remote_path: &Path, recursive: bool) -> Result<()> {
        let result = if recursive {
            tokio::fs::remove_dir_all(remote_path).await
        } else {
            tokio::fs::remove_file(remote_path).await
        };
        match result {
            Ok(()) => Ok(()),
            Err(_) if !remote_path.exists() => Ok(()),
            Err(e) => Err(Error::io(format!("deleting '{}'", remote_path.display()), e)),
        }
    }

    async fn find(&mut self, root: &Path, pattern: &str) -> Result<Vec<String>> {
        let glob = globset::Glob::new(pattern)
            .map_err(|e| Error::Internal(format!("invalid find pattern '{pattern}': {e}")))?
            .compile_matcher();
        let mut matches = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    if glob.is_match(name) {
                        matches.push(entry.path().to_string_lossy().to_string());
                    }
                }
            }
        }
        Ok(matches)
    }

    async fn remote_file_stats(&mut self, remote_dir: &Path) -> Result<Vec<(String, u64, i64)>> {
        let excludes = sync::build_excludes(&[])?;
        let stats = sync::local_file_stats(remote_dir, &excludes)?;
        Ok(stats.into_iter().map(|(p, (s, m))| (p, s, m)).collect())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
