//! Target selector type (spec §3 "Target").

use crate::inventory::Destination;
use serde::Deserialize;

/// A named selector. Variants may combine; resolution unions them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetSpec {
    #[serde(default)]
    pub hosts: Vec<Destination>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub names: Vec<String>,
}

impl TargetSpec {
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
            && self.groups.is_empty()
            && self.tags.is_empty()
            && self.names.is_empty()
    }
}
