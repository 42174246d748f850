//! Task model: an ordered, non-empty sequence of commands (spec §3).

use super::command::{Command, CommandRaw};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct TaskRaw {
    pub name: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub ssh_key: Option<String>,
    /// Local command run on first failure, `{SPOT_ERROR}` substituted.
    #[serde(default)]
    pub on_error: Option<String>,
    /// Preferred over the CLI target when the CLI target is the default.
    #[serde(default)]
    pub targets: Vec<String>,
    pub commands: Vec<CommandRaw>,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub name: String,
    pub user: Option<String>,
    pub ssh_key: Option<String>,
    pub on_error: Option<String>,
    pub targets: Vec<String>,
    pub commands: Vec<Command>,
}

impl TaskRaw {
    pub fn into_task(self) -> Result<Task, String> {
        if self.name.trim().is_empty() {
            return Err("task name must not be empty".to_string());
        }
        if self.commands.is_empty() {
            return Err(format!("task '{}' must have at least one command", self.name));
        }
        let mut commands = Vec::with_capacity(self.commands.len());
        for raw in self.commands {
            commands.push(raw.into_command()?);
        }
        Ok(Task {
            name: self.name,
            user: self.user,
            ssh_key: self.ssh_key,
            on_error: self.on_error,
            targets: self.targets,
            commands,
        })
    }
}

impl Task {
    /// Apply `only`/`skip`/`no_auto` command filtering, as the Runner does
    /// before dispatching a task (spec §4.4 step 1).
    pub fn filtered_commands(&self, only: &[String], skip: &[String]) -> Vec<&Command> {
        self.commands
            .iter()
            .filter(|c| {
                if !skip.is_empty() && skip.contains(&c.name) {
                    return false;
                }
                if !only.is_empty() {
                    return only.contains(&c.name);
                }
                !c.options.no_auto
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_yaml() -> &'static str {
        r#"
name: deploy
commands:
  - name: one
    script: echo one
  - name: two
    script: echo two
    options:
      no_auto: true
"#
    }

    #[test]
    fn no_auto_skipped_unless_selected() {
        let raw: TaskRaw = serde_yaml::from_str(task_yaml()).unwrap();
        let task = raw.into_task().unwrap();

        let default = task.filtered_commands(&[], &[]);
        assert_eq!(default.len(), 1);
        assert_eq!(default[0].name, "one");

        let only = task.filtered_commands(&["two".to_string()], &[]);
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].name, "two");
    }

    #[test]
    fn skip_removes_named_command() {
        let raw: TaskRaw = serde_yaml::from_str(task_yaml()).unwrap();
        let task = raw.into_task().unwrap();
        let filtered = task.filtered_commands(&[], &["one".to_string()]);
        assert!(filtered.is_empty());
    }

    #[test]
    fn empty_commands_rejected() {
        let raw: TaskRaw = serde_yaml::from_str("name: t\ncommands: []\n").unwrap();
        assert!(raw.into_task().is_err());
    }
}
