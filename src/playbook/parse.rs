//! Playbook file decoding: simplified-vs-full normalization (spec §4.1, §6).

use super::command::CommandRaw;
use super::target::TargetSpec;
use super::task::TaskRaw;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

/// Full-form on-disk shape: `user, ssh_key, inventory, targets, tasks[]`.
#[derive(Debug, Deserialize)]
struct FullPlaybookFile {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    ssh_key: Option<String>,
    #[serde(default)]
    inventory: Option<String>,
    #[serde(default)]
    targets: IndexMap<String, TargetSpec>,
    tasks: Vec<TaskRaw>,
}

/// Simplified-form on-disk shape: `user, ssh_key, inventory, targets[], task[]`.
#[derive(Debug, Deserialize)]
struct SimplifiedPlaybookFile {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    ssh_key: Option<String>,
    #[serde(default)]
    inventory: Option<String>,
    #[serde(default)]
    targets: Vec<String>,
    task: Vec<CommandRaw>,
}

/// Normalized, format-independent representation consumed by
/// [`super::Playbook::from_parts`].
pub struct NormalizedPlaybook {
    pub user: Option<String>,
    pub ssh_key: Option<String>,
    pub inventory: Option<String>,
    pub targets: IndexMap<String, TargetSpec>,
    pub tasks: Vec<TaskRaw>,
}

/// Decode a playbook file, deciding full-vs-simplified by probing for a
/// top-level `tasks` key (full) versus `task` key (simplified), then
/// normalizing simplified into full: a single task named after the file
/// stem, whose `targets` is the flat target-name list verbatim (each entry
/// is resolved later through the normal [`super::Playbook::target_hosts`]
/// priority chain, so no synthetic `TargetSpec` is needed here).
pub fn decode(path: &Path, raw: &str) -> Result<NormalizedPlaybook> {
    let is_toml = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);

    let value: serde_yaml::Value = if is_toml {
        let toml_value: toml::Value = toml::from_str(raw)
            .map_err(|e| Error::config(path, format!("TOML parse error: {e}")))?;
        serde_yaml::to_value(toml_value)
            .map_err(|e| Error::config(path, format!("TOML->YAML bridge error: {e}")))?
    } else {
        serde_yaml::from_str(raw).map_err(|e| Error::config(path, format!("YAML parse error: {e}")))?
    };

    let is_full = value.get("tasks").is_some();

    if is_full {
        let file: FullPlaybookFile = serde_yaml::from_value(value)
            .map_err(|e| Error::config(path, format!("invalid full-form playbook: {e}")))?;
        Ok(NormalizedPlaybook {
            user: file.user,
            ssh_key: file.ssh_key,
            inventory: file.inventory,
            targets: file.targets,
            tasks: file.tasks,
        })
    } else {
        let file: SimplifiedPlaybookFile = serde_yaml::from_value(value)
            .map_err(|e| Error::config(path, format!("invalid simplified-form playbook: {e}")))?;
        let task_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("playbook")
            .to_string();
        let task = TaskRaw {
            name: task_name,
            user: None,
            ssh_key: None,
            on_error: None,
            targets: file.targets,
            commands: file.task,
        };
        Ok(NormalizedPlaybook {
            user: file.user,
            ssh_key: file.ssh_key,
            inventory: file.inventory,
            targets: IndexMap::new(),
            tasks: vec![task],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn full_form_decodes() {
        let raw = r#"
user: deploy
targets:
  web:
    groups: ["web"]
tasks:
  - name: t1
    commands:
      - name: c1
        script: echo hi
"#;
        let n = decode(&PathBuf::from("p.yml"), raw).unwrap();
        assert_eq!(n.tasks.len(), 1);
        assert_eq!(n.targets.len(), 1);
        assert_eq!(n.user.as_deref(), Some("deploy"));
    }

    #[test]
    fn simplified_form_normalizes_to_one_task() {
        let raw = r#"
user: deploy
targets: ["web1", "web2"]
task:
  - name: c1
    script: echo hi
"#;
        let n = decode(&PathBuf::from("deploy.yml"), raw).unwrap();
        assert_eq!(n.tasks.len(), 1);
        assert_eq!(n.tasks[0].name, "deploy");
        assert_eq!(n.tasks[0].targets, vec!["web1".to_string(), "web2".to_string()]);
        assert!(n.targets.is_empty());
    }
}
