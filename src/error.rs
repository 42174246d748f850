//! Error taxonomy for Spot.
//!
//! Every error the engine can surface to an operator belongs to one of the
//! kinds below. Each layer (host, task, command) wraps the error with context
//! as it propagates; the [`Runner`](crate::runner::Runner) boundary collects
//! per-host errors into a [`MultiError`].

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error taxonomy described in spec §7.
#[derive(Error, Debug)]
pub enum Error {
    /// Playbook parse/validate failure. Fatal at start.
    #[error("failed to parse playbook '{path}': {message}")]
    Config {
        path: PathBuf,
        message: String,
    },

    /// Inventory fetch/decode failure. Fatal.
    #[error("failed to load inventory '{location}': {message}")]
    Inventory {
        location: String,
        message: String,
    },

    /// TCP dial, SSH handshake or auth failure. Surfaced per host.
    #[error("failed to connect to '{host}': {message}")]
    Connect {
        host: String,
        message: String,
    },

    /// Remote command non-zero exit, or a failure to even start it.
    #[error("command failed on '{host}' (task '{task}') with exit code {exit_code:?}: {message}")]
    Exec {
        host: String,
        task: String,
        exit_code: Option<i32>,
        message: String,
    },

    /// SCP upload failure.
    #[error("upload to '{host}' failed: {message}")]
    Upload { host: String, message: String },

    /// SCP download failure.
    #[error("download from '{host}' failed: {message}")]
    Download { host: String, message: String },

    /// Cancellation observed mid-operation. Never triggers `on_error`.
    #[error("operation on '{host}' canceled")]
    Canceled { host: String },

    /// `wait` command exceeded its timeout.
    #[error("wait on '{host}' timed out after {timeout_secs}s: {message}")]
    Timeout {
        host: String,
        timeout_secs: u64,
        message: String,
    },

    /// Malformed registered variable, missing secret, or other
    /// programmer-facing invariant violation. Fatal at the task boundary.
    #[error("internal error: {0}")]
    Internal(String),

    /// A secrets provider could not resolve a key.
    #[error("secret '{key}' unavailable: {message}")]
    Secret { key: String, message: String },

    /// Wraps an I/O error with the operation that produced it.
    #[error("io error during {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn inventory(location: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Inventory {
            location: location.into(),
            message: message.into(),
        }
    }

    pub fn connect(host: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Connect {
            host: host.into(),
            message: message.into(),
        }
    }

    pub fn exec(
        host: impl Into<String>,
        task: impl Into<String>,
        exit_code: Option<i32>,
        message: impl Into<String>,
    ) -> Self {
        Error::Exec {
            host: host.into(),
            task: task.into(),
            exit_code,
            message: message.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this error kind runs the task's `on_error` hook (spec §7:
    /// "`on_error` runs only for ExecError/Upload/Download/Timeout, not for
    /// Cancel").
    pub fn triggers_on_error(&self) -> bool {
        matches!(
            self,
            Error::Exec { .. } | Error::Upload { .. } | Error::Download { .. } | Error::Timeout { .. }
        )
    }
}

/// An aggregation of per-host errors produced by a single `Runner::run` call.
///
/// Rendered in the CLI as `"<prefix>: N error(s) occurred:\n   [i] <msg>\n..."`.
#[derive(Debug, Default)]
pub struct MultiError {
    pub errors: Vec<(String, Error)>,
}

impl MultiError {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn push(&mut self, host: impl Into<String>, err: Error) {
        self.errors.push((host.into(), err));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Internal(self.render("run")))
        }
    }

    pub fn render(&self, prefix: &str) -> String {
        let mut out = format!("{prefix}: {} error(s) occurred:\n", self.errors.len());
        for (i, (host, err)) in self.errors.iter().enumerate() {
            out.push_str(&format!("   [{}] {host}: {err}\n", i));
        }
        out
    }
}

impl std::fmt::Display for MultiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render("spot"))
    }
}

impl std::error::Error for MultiError {}
