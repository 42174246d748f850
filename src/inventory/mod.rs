//! Inventory loading and the synthetic `all` group (spec §3, §4.1).

pub mod destination;

pub use destination::{dedup_destinations, Destination};

use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Timeout for fetching an inventory over HTTP (spec §4.1: "10-s timeout").
const INVENTORY_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// On-disk inventory shape: `{groups: {name: [Destination]}, hosts: [Destination]}`.
#[derive(Debug, Clone, Default, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    groups: IndexMap<String, Vec<Destination>>,
    #[serde(default)]
    hosts: Vec<Destination>,
}

/// Mapping group-name → ordered list of Destinations, with the synthetic
/// `all` group always present once any host exists.
#[derive(Debug, Clone, Default)]
pub struct InventoryData {
    groups: IndexMap<String, Vec<Destination>>,
}

impl InventoryData {
    pub fn empty() -> Self {
        Self {
            groups: IndexMap::new(),
        }
    }

    /// Load and decode an inventory from a file path or `http(s)://` URL,
    /// filling host defaults and building the synthetic `all` group.
    pub async fn load(location: &str, default_user: Option<&str>) -> Result<Self> {
        let raw = if location.starts_with("http://") || location.starts_with("https://") {
            Self::fetch_http(location).await?
        } else {
            tokio::fs::read_to_string(location)
                .await
                .map_err(|e| Error::inventory(location, e.to_string()))?
        };
        let mut file = Self::decode(location, &raw)?;

        for dest in file.hosts.iter_mut() {
            dest.apply_defaults(default_user);
        }
        for group in file.groups.values_mut() {
            for dest in group.iter_mut() {
                dest.apply_defaults(default_user);
            }
        }

        let mut groups = file.groups;
        // Standalone `hosts:` entries live in a synthetic `ungrouped` bucket
        // so they still participate in group-name resolution if referenced.
        if !file.hosts.is_empty() {
            groups.insert("ungrouped".to_string(), file.hosts.clone());
        }

        let mut inv = Self { groups };
        inv.rebuild_all(file.hosts);
        Ok(inv)
    }

    async fn fetch_http(location: &str) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(INVENTORY_FETCH_TIMEOUT)
            .build()
            .map_err(|e| Error::inventory(location, e.to_string()))?;
        let resp = client
            .get(location)
            .send()
            .await
            .map_err(|e| Error::inventory(location, e.to_string()))?;
        resp.text()
            .await
            .map_err(|e| Error::inventory(location, e.to_string()))
    }

    fn decode(location: &str, raw: &str) -> Result<InventoryFile> {
        let is_toml = Path::new(location)
            .extension()
            .map(|e| e.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        if is_toml {
            toml::from_str(raw).map_err(|e| Error::inventory(location, e.to_string()))
        } else {
            serde_yaml::from_str(raw).map_err(|e| Error::inventory(location, e.to_string()))
        }
    }

    /// Recompute the synthetic `all` group: the union of every other group
    /// plus standalone hosts, deduplicated and sorted by host name for
    /// determinism (spec §3).
    fn rebuild_all(&mut self, standalone_hosts: Vec<Destination>) {
        let mut all: Vec<Destination> = standalone_hosts;
        for (name, dests) in &self.groups {
            if name == "all" {
                continue;
            }
            all.extend(dests.iter().cloned());
        }
        let mut all = dedup_destinations(all);
        all.sort_by(|a, b| a.host.cmp(&b.host));
        if !all.is_empty() || !self.groups.is_empty() {
            self.groups.insert("all".to_string(), all);
        }
    }

    pub fn group(&self, name: &str) -> Option<&[Destination]> {
        self.groups.get(name).map(|v| v.as_slice())
    }

    pub fn all(&self) -> &[Destination] {
        self.groups
            .get("all")
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn group_names(&self) -> impl Iterator<Item = &String> {
        self.groups.keys()
    }

    /// Find a single Destination in `all` by `name` or `host` (target
    /// resolution priority 3, spec §4.1).
    pub fn find_by_name_or_host(&self, query: &str) -> Option<&Destination> {
        self.all().iter().find(|d| {
            d.name.as_deref() == Some(query) || d.host == query
        })
    }

    pub fn insert_group(&mut self, name: impl Into<String>, dests: Vec<Destination>) {
        self.groups.insert(name.into(), dests);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_yaml_builds_all_group_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inv.yml");
        tokio::fs::write(
            &path,
            r#"
groups:
  web:
    - host: web2.example.com
    - host: web1.example.com
hosts:
  - host: solo.example.com
"#,
        )
        .await
        .unwrap();

        let inv = InventoryData::load(path.to_str().unwrap(), Some("deploy"))
            .await
            .unwrap();
        let all: Vec<_> = inv.all().iter().map(|d| d.host.clone()).collect();
        assert_eq!(
            all,
            vec![
                "solo.example.com".to_string(),
                "web1.example.com".to_string(),
                "web2.example.com".to_string()
            ]
        );
        assert_eq!(inv.group("web").unwrap().len(), 2);
        assert_eq!(
            inv.group("web").unwrap()[0].user.as_deref(),
            Some("deploy")
        );
    }

    #[tokio::test]
    async fn missing_file_is_inventory_error() {
        let err = InventoryData::load("/no/such/file.yml", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Inventory { .. }));
    }
}
