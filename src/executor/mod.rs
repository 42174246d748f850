//! Executor: all per-host I/O (spec §4.3). Not thread-safe — a session is
//! used by exactly one scheduler task.

pub mod local;
pub mod ssh;
pub mod sync;

pub use local::LocalExecutor;
pub use ssh::SshExecutor;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Result of a completed remote (or local) command run.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    pub stdout_lines: Vec<String>,
    pub stderr: String,
    pub exit_code: i32,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait Executor: Send {
    /// Host label used in streamed output and error messages.
    fn host_label(&self) -> &str;

    /// Run a shell command, streaming output and honoring cancellation
    /// (spec §4.3 "Run").
    async fn run(&mut self, ctx: CancellationToken, cmd: &str) -> Result<RunOutput>;

    /// Upload a local file to a remote path via the SCP sink protocol,
    /// preserving permission bits and mtime (spec §4.3 "Upload").
    async fn upload(&mut self, local_path: &Path, remote_path: &Path, mkdir: bool) -> Result<()>;

    /// Symmetric to [`Executor::upload`].
    async fn download(&mut self, remote_path: &Path, local_path: &Path, mkdir: bool) -> Result<()>;

    /// `rm -fr`/`rm -f`; missing paths are not an error (spec §4.3 "Delete").
    async fn delete(&mut self, remote_path: &Path, recursive: bool) -> Result<()>;

    /// `find <root> -name <pattern>` (spec §4.3 "Find").
    async fn find(&mut self, root: &Path, pattern: &str) -> Result<Vec<String>>;

    /// Remote file properties keyed by relative path, for [`sync::plan`]
    /// (spec §4.3 "Sync").
    async fn remote_file_stats(&mut self, remote_dir: &Path) -> Result<Vec<(String, u64, i64)>>;

    async fn close(&mut self) -> Result<()>;
}
