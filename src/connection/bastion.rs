//! `ProxyCommand`-style bastion transport: a child process whose stdio
//! carries the SSH stream to the final hop (spec §4.2, §9).

use crate::error::{Error, Result};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::process::{Child, ChildStdin, ChildStdout};

/// Expands `%h`/`%p` in a `ProxyCommand` template and spawns it, wiring its
/// stdio as the transport for the outer SSH handshake. Killed when dropped.
pub struct ProxyTransport {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
}

impl ProxyTransport {
    pub fn spawn(template: &str, host: &str, port: u16) -> Result<Self> {
        let expanded = template.replace("%h", host).replace("%p", &port.to_string());
        let args = shell_words::split(&expanded)
            .map_err(|e| Error::connect(host, format!("invalid proxy command: {e}")))?;
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| Error::connect(host, "empty proxy command"))?;

        let mut child = tokio::process::Command::new(program)
            .args(rest)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::connect(host, format!("failed to spawn proxy command: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::connect(host, "proxy command has no stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::connect(host, "proxy command has no stdout"))?;

        Ok(Self { child, stdin, stdout })
    }
}

impl AsyncRead for ProxyTransport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

impl AsyncWrite for ProxyTransport {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        Pin::new(&mut self.stdin).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stdin).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.stdin).poll_shutdown(cx)
    }
}

impl Drop for ProxyTransport {
    fn drop(&mut self) {
        let _ = self.child.start_kill();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_expands_host_and_port() {
        let expanded = "ssh -W %h:%p bastion.example.com"
            .replace("%h", "target")
            .replace("%p", "2200");
        assert_eq!(expanded, "ssh -W target:2200 bastion.example.com");
    }
}
