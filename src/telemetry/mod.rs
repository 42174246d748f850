//! Structured logging setup (ambient stack supplement; grounded in the
//! teacher's `telemetry/` module, scaled to what this crate's Non-goals
//! leave in scope: no OTLP export, no metrics registry).

pub mod config;
pub mod logging;

pub use config::{LogFormat, LogLevel, LoggingConfig};
pub use logging::init;
