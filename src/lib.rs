//! Spot — a concurrent, agent-less SSH configuration and deployment
//! orchestrator.
//!
//! An operator declares a *playbook* (ordered tasks, each a sequence of
//! commands) and a set of *targets* (hosts, groups, inventories). Spot
//! connects to every resolved host over SSH and applies each task's
//! commands in order, fanned out across hosts up to a bounded concurrency,
//! streaming output and collecting per-host results.
//!
//! The engine is exposed as a library so the CLI (`src/main.rs`) is a thin
//! wrapper: [`playbook::Playbook`] loads and resolves a playbook,
//! [`connection::Connector`] opens per-host [`executor::Executor`]
//! sessions, and [`runner::Runner`] drives a task across a target's
//! resolved hosts.

pub mod cli;
pub mod connection;
pub mod error;
pub mod executor;
pub mod generator;
pub mod inventory;
pub mod output;
pub mod playbook;
pub mod runner;
pub mod secrets;
pub mod telemetry;

pub use error::{Error, MultiError, Result};
