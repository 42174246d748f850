//! SSH-backed [`Executor`] (spec §4.3), grounded on the teacher's
//! `connection::russh` module: one channel per `run`, SFTP for
//! upload/download, shell-outs for `find`/`stat`/`delete`.

use super::{sync, Executor, RunOutput};
use crate::connection::ssh::ClientHandler;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use russh::client::Handle;
use russh::ChannelMsg;
use russh_sftp::client::SftpSession;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// Quotes `s` for safe use as a single shell word.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

pub struct SshExecutor {
    host_label: String,
    handle: Handle<ClientHandler>,
}

impl SshExecutor {
    pub fn new(host_label: String, handle: Handle<ClientHandler>) -> Self {
        Self { host_label, handle }
    }

    async fn open_sftp(&self) -> Result<SftpSession> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::connect(&self.host_label, format!("failed to open channel: {e}")))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| Error::connect(&self.host_label, format!("failed to request sftp: {e}")))?;
        SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| Error::connect(&self.host_label, format!("sftp handshake failed: {e}")))
    }

    async fn run_capturing(&mut self, cmd: &str) -> Result<RunOutput> {
        let mut channel = self.handle.channel_open_session().await.map_err(|e| {
            Error::exec(&self.host_label, "<internal>", None, format!("failed to open channel: {e}"))
        })?;
        channel
            .exec(true, cmd)
            .await
            .map_err(|e| Error::exec(&self.host_label, cmd, None, format!("failed to exec: {e}")))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
                ChannelMsg::ExitStatus { exit_status } => exit_code = Some(exit_status as i32),
                ChannelMsg::Close => break,
                _ => {}
            }
        }

        let stdout_str = String::from_utf8_lossy(&stdout).to_string();
        let stderr_str = String::from_utf8_lossy(&stderr).to_string();
        for line in stdout_str.lines() {
            crate::output::emit(&self.host_label, line);
        }
        Ok(RunOutput {
            stdout_lines: stdout_str.lines().map(str::to_string).filter(|l| !l.is_empty()).collect(),
            stderr: stderr_str,
            exit_code: exit_code.unwrap_or(i32::MAX),
        })
    }
}

#[async_trait::async_trait]
impl Executor for SshExecutor {
    fn host_label(&self) -> &str {
        &self.host_label
    }

    async fn run(&mut self, ctx: CancellationToken, cmd: &str) -> Result<RunOutput> {
        let mut channel = self.handle.channel_open_session().await.map_err(|e| {
            Error::exec(&self.host_label, cmd, None, format!("failed to open channel: {e}"))
        })?;
        channel
            .exec(true, cmd)
            .await
            .map_err(|e| Error::exec(&self.host_label, cmd, None, format!("failed to exec: {e}")))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;
        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    let _ = channel.signal(russh::Sig::INT).await;
                    return Err(Error::Canceled { host: self.host_label.clone() });
                }
                msg = channel.wait() => {
                    match msg {
                        Some(ChannelMsg::Data { ref data }) => stdout.extend_from_slice(data),
                        Some(ChannelMsg::ExtendedData { ref data, ext: 1 }) => stderr.extend_from_slice(data),
                        Some(ChannelMsg::ExitStatus { exit_status }) => exit_code = Some(exit_status as i32),
                        Some(ChannelMsg::Close) | None => break,
                        _ => {}
                    }
                }
            }
        }

        let stdout_str = String::from_utf8_lossy(&stdout).to_string();
        for line in stdout_str.lines() {
            crate::output::emit(&self.host_label, line);
        }
        for line in String::from_utf8_lossy(&stderr).lines() {
            crate::output::emit(&self.host_label, line);
        }

        Ok(RunOutput {
            stdout_lines: stdout_str.lines().map(str::to_string).filter(|l| !l.is_empty()).collect(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            exit_code: exit_code.unwrap_or(i32::MAX),
        })
    }

    async fn upload(&mut self, local_path: &Path, remote_path: &Path, mkdir: bool) -> Result<()> {
        if mkdir {
            if let Some(parent) = remote_path.parent() {
                let cmd = format!("mkdir -p {}", shell_quote(&parent.to_string_lossy()));
                self.run_capturing(&cmd).await?;
            }
        }

        let content = tokio::fs::read(local_path)
            .await
            .map_err(|e| Error::io(format!("reading local file '{}'", local_path.display()), e))?;
        let metadata = tokio::fs::metadata(local_path)
            .await
            .map_err(|e| Error::io(format!("stat local file '{}'", local_path.display()), e))?;

        let sftp = self.open_sftp().await?;
        let remote_path_str = remote_path.to_string_lossy().to_string();
        let mut file = sftp
            .create(&remote_path_str)
            .await
            .map_err(|e| Error::Upload { host: self.host_label.clone(), message: e.to_string() })?;
        file.write_all(&content)
            .await
            .map_err(|e| Error::Upload { host: self.host_label.clone(), message: e.to_string() })?;
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut attrs = russh_sftp::protocol::FileAttributes::default();
            attrs.permissions = Some(metadata.permissions().mode());
            let _ = sftp.set_metadata(&remote_path_str, attrs).await;
        }
        drop(sftp);

        if let Ok(modified) = metadata.modified() {
            let datetime: DateTime<Utc> = modified.into();
            let touch_fmt = datetime.format("%Y%m%d%H%M.%S").to_string();
            let cmd = format!("touch -m -t {} {}", touch_fmt, shell_quote(&remote_path_str));
            self.run_capturing(&cmd).await?;
        }

        Ok(())
    }

    async fn download(&mut self, remote_path: &Path, local_path: &Path, mkdir: bool) -> Result<()> {
        if mkdir {
            if let Some(parent) = local_path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::io(format!("creating local dir '{}'", parent.display()), e))?;
            }
        }

        let sftp = self.open_sftp().await?;
        let remote_path_str = remote_path.to_string_lossy().to_string();
        let mut file = sftp
            .open(&remote_path_str)
            .await
            .map_err(|e| Error::Download { host: self.host_label.clone(), message: e.to_string() })?;
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .await
            .map_err(|e| Error::Download { host: self.host_label.clone(), message: e.to_string() })?;
        drop(sftp);

        tokio::fs::write(local_path, content)
            .await
            .map_err(|e| Error::io(format!("writing local file '{}'", local_path.display()), e))?;
        Ok(())
    }

    async fn delete(&mut self, remote_path: &Path, recursive: bool) -> Result<()> {
        let flag = if recursive { "-fr" } else { "-f" };
        let cmd = format!("rm {} {}", flag, shell_quote(&remote_path.to_string_lossy()));
        self.run_capturing(&cmd).await?;
        Ok(())
    }

    async fn find(&mut self, root: &Path, pattern: &str) -> Result<Vec<String>> {
        let cmd = format!(
            "find {} -name {}",
            shell_quote(&root.to_string_lossy()),
            shell_quote(pattern)
        );
        let output = self.run_capturing(&cmd).await?;
        Ok(output.stdout_lines)
    }

    async fn remote_file_stats(&mut self, remote_dir: &Path) -> Result<Vec<(String, u64, i64)>> {
        let cmd = format!(
            "find {} -type f -exec stat -c '%n:%s:%Y' {{}} \\;",
            shell_quote(&remote_dir.to_string_lossy())
        );
        let output = self.run_capturing(&cmd).await?;
        let joined = output.stdout_lines.join("\n");
        let stats = sync::parse_remote_stats(&joined, remote_dir);
        Ok(stats.into_iter().map(|(p, (s, m))| (p, s, m)).collect())
    }

    async fn close(&mut self) -> Result<()> {
        let _ = self.handle.disconnect(russh::Disconnect::ByApplication, "", "en").await;
        Ok(())
    }
}
