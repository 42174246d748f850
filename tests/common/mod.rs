//! Fake in-process `Connector`/`Executor` pair used by the scenario tests.
//!
//! `TrackingConnector` hands out a [`LocalExecutor`] per connect — real local
//! shell execution, no network or SSH involved — while recording how many
//! sessions are open at once, so tests can assert on bounded concurrency
//! without a hand-rolled mock framework.

use async_trait::async_trait;
use spot::connection::Connector;
use spot::error::Result;
use spot::executor::{Executor, LocalExecutor, RunOutput};
use spot::inventory::Destination;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct TrackingExecutor {
    inner: LocalExecutor,
    active: Arc<AtomicUsize>,
    closed: bool,
}

#[async_trait]
impl Executor for TrackingExecutor {
    fn host_label(&self) -> &str {
        self.inner.host_label()
    }

    async fn run(&mut self, ctx: CancellationToken, cmd: &str) -> Result<RunOutput> {
        self.inner.run(ctx, cmd).await
    }

    async fn upload(&mut self, local_path: &Path, remote_path: &Path, mkdir: bool) -> Result<()> {
        self.inner.upload(local_path, remote_path, mkdir).await
    }

    async fn download(&mut self, remote_path: &Path, local_path: &Path, mkdir: bool) -> Result<()> {
        self.inner.download(remote_path, local_path, mkdir).await
    }

    async fn delete(&mut self, remote_path: &Path, recursive: bool) -> Result<()> {
        self.inner.delete(remote_path, recursive).await
    }

    async fn find(&mut self, root: &Path, pattern: &str) -> Result<Vec<String>> {
        self.inner.find(root, pattern).await
    }

    async fn remote_file_stats(&mut self, remote_dir: &Path) -> Result<Vec<(String, u64, i64)>> {
        self.inner.remote_file_stats(remote_dir).await
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
        self.inner.close().await
    }
}

impl Drop for TrackingExecutor {
    fn drop(&mut self) {
        if !self.closed {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Connects instantly (no dial, no handshake) and tracks the high-water
/// mark of simultaneously open sessions via `fetch_max`.
pub struct TrackingConnector {
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl TrackingConnector {
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            max_active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn peak(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for TrackingConnector {
    async fn connect(&self, _ctx: CancellationToken, dest: &Destination) -> Result<Box<dyn Executor>> {
        let prev = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(prev, Ordering::SeqCst);
        Ok(Box::new(TrackingExecutor {
            inner: LocalExecutor::new(dest.label()),
            active: self.active.clone(),
            closed: false,
        }))
    }
}

/// Writes `yaml` to a temp file and returns the path plus the guard that
/// must be kept alive for as long as the path is used.
pub fn write_playbook(dir: &tempfile::TempDir, yaml: &str) -> std::path::PathBuf {
    let path = dir.path().join("playbook.yml");
    std::fs::write(&path, yaml).expect("write test playbook");
    path
}
