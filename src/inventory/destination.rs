//! A single SSH endpoint (spec §3 "Destination").

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

fn default_port() -> u16 {
    22
}

/// One SSH endpoint. Identity for deduplication purposes is the
/// `(host, port, user)` triple — two `Destination`s with the same triple but
/// different `name`/`tags` are still considered the same host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    /// Optional human label, shown in logs in place of `host:port` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
}

impl Destination {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            name: None,
            host: host.into(),
            port: default_port(),
            user: None,
            tags: BTreeSet::new(),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The `(host, port, user)` triple used for deduplication (spec §3).
    pub fn identity(&self) -> (String, u16, String) {
        (
            self.host.clone(),
            self.port,
            self.user.clone().unwrap_or_default(),
        )
    }

    /// Label shown in logs: `name` if set, else `host:port`.
    pub fn label(&self) -> String {
        match &self.name {
            Some(n) => n.clone(),
            None => format!("{}:{}", self.host, self.port),
        }
    }

    /// Fill `port`/`user` defaults coming from the inventory/playbook
    /// default user, as described in spec §4.1 "Inventory loading".
    pub fn apply_defaults(&mut self, default_user: Option<&str>) {
        if self.user.is_none() {
            self.user = default_user.map(|s| s.to_string());
        }
    }

    /// Parse a `host[:port]` literal, as used by target-resolution rule 4
    /// (spec §4.1).
    pub fn parse_host_port(spec: &str, default_user: Option<&str>) -> Self {
        let (host, port) = match spec.rsplit_once(':') {
            Some((h, p)) => match p.parse::<u16>() {
                Ok(port) => (h.to_string(), port),
                Err(_) => (spec.to_string(), default_port()),
            },
            None => (spec.to_string(), default_port()),
        };
        Self {
            name: None,
            host,
            port,
            user: default_user.map(|s| s.to_string()),
            tags: BTreeSet::new(),
        }
    }
}

/// Deduplicate a list of `Destination`s by `(host, port, user)` identity,
/// preserving first-seen order (spec invariant: "Destination identity triple
/// deduplicated at resolution").
pub fn dedup_destinations(dests: Vec<Destination>) -> Vec<Destination> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(dests.len());
    for d in dests {
        if seen.insert(d.identity()) {
            out.push(d);
        }
    }
    out
}
