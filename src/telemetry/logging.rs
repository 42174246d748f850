//! Structured logging, built on `tracing` + `tracing-subscriber` the way the
//! teacher's `telemetry::logging` does it, scaled down to the single
//! concrete writer this crate needs and fitted with a redaction pass so
//! secret values installed via [`crate::output::install_redactor`] never
//! reach stdout/stderr through a log line either (spec §8 invariant 8).

use crate::error::{Error, Result};
use crate::telemetry::config::{LogFormat, LoggingConfig};
use std::io::{self, Write};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Wraps stderr, redacting installed secret values out of every write.
#[derive(Clone, Default)]
struct RedactingWriter;

impl Write for RedactingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let text = String::from_utf8_lossy(buf);
        let redacted = crate::output::redact(&text);
        io::stderr().write_all(redacted.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for RedactingWriter {
    type Writer = RedactingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter
    }
}

/// Initialize the global `tracing` subscriber. Call once at startup; a
/// second call is a programmer error and returns `Error::Internal`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config);
    let ansi = config.ansi_colors;
    let with_target = config.with_target;

    let result = match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_ansi(ansi)
                    .with_target(with_target)
                    .with_writer(RedactingWriter),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_ansi(ansi)
                    .with_target(with_target)
                    .with_writer(RedactingWriter),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(with_target)
                    .with_writer(RedactingWriter),
            )
            .try_init(),
    };

    result.map_err(|e| Error::Internal(format!("logging already initialized: {e}")))
}

fn build_filter(config: &LoggingConfig) -> EnvFilter {
    if let Some(directive) = &config.filter {
        return EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(config.level.as_filter_str()));
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_filter_str()))
}
