//! Command model: the six verbs and their option matrix (spec §3).

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Deserialize a field that may be given as a single object or a list of
/// objects, always producing `Some(Vec<T>)` (or `None` if absent). Mirrors
/// the teacher's `string_or_vec` visitor pattern, generalized to structs, so
/// that `copy:` and `sync:` each accept both forms (spec §4.1).
fn one_or_many<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        One(T),
        Many(Vec<T>),
    }
    let v: Option<OneOrMany<T>> = Option::deserialize(deserializer)?;
    Ok(v.map(|v| match v {
        OneOrMany::One(t) => vec![t],
        OneOrMany::Many(ts) => ts,
    }))
}

/// Copy a single local file (or glob) to a remote destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopySpec {
    pub src: String,
    pub dst: String,
    #[serde(default)]
    pub mkdir: bool,
    /// Force overwrite even if destination already matches by size/mtime
    /// (testable property 6: "no-op unless `force: true`").
    #[serde(default)]
    pub force: bool,
}

/// Recursive incremental directory sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSpec {
    pub src: String,
    pub dst: String,
    #[serde(default)]
    pub delete: bool,
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSpec {
    pub path: String,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitSpec {
    pub cmd: String,
    pub timeout: u64,
    pub interval: u64,
}

/// The six command verbs (spec §3: "exactly one verb field set").
#[derive(Debug, Clone, Serialize)]
pub enum Verb {
    Script(String),
    Copy(Vec<CopySpec>),
    Sync(Vec<SyncSpec>),
    Delete(DeleteSpec),
    Wait(WaitSpec),
    /// `echo`/`line`: print a substituted string without touching the host.
    Echo(String),
}

/// Per-command execution options (spec §3 "CmdOptions").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CmdOptions {
    #[serde(default)]
    pub ignore_errors: bool,
    /// Skipped unless explicitly selected via `--only`.
    #[serde(default)]
    pub no_auto: bool,
    /// Run on the operator's machine instead of the remote host.
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub sudo: bool,
    /// Secret keys this command needs; resolved at load time into
    /// [`Command::secrets`].
    #[serde(default)]
    pub secrets: Vec<String>,
    /// Host filter: entries without `!` are a positive any-of list, entries
    /// prefixed `!` are a negative none-of list. Resolved per spec §9:
    /// "positive filter must match AND no negative filter may match".
    #[serde(default)]
    pub only_on: Vec<String>,
}

impl CmdOptions {
    /// Whether `host` (matched against its label/name/host string) passes
    /// the `only_on` filter.
    pub fn host_allowed(&self, candidates: &[&str]) -> bool {
        if self.only_on.is_empty() {
            return true;
        }
        let (negative, positive): (Vec<&str>, Vec<&str>) =
            self.only_on.iter().map(|s| s.as_str()).partition(|s| s.starts_with('!'));
        let negative: Vec<&str> = negative.iter().map(|s| &s[1..]).collect();

        let positive_ok = positive.is_empty()
            || positive.iter().any(|p| candidates.contains(p));
        let negative_ok = !negative.iter().any(|n| candidates.contains(n));
        positive_ok && negative_ok
    }
}

/// Wire format for a command: a flat object where exactly one verb field is
/// set. Deserialized first, then validated/converted into [`Command`].
#[derive(Debug, Clone, Deserialize)]
pub struct CommandRaw {
    pub name: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default, rename = "cond")]
    pub condition: Option<String>,
    #[serde(default)]
    pub register: Vec<String>,
    #[serde(default)]
    pub options: CmdOptions,

    #[serde(default)]
    pub script: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub copy: Option<Vec<CopySpec>>,
    #[serde(default, deserialize_with = "one_or_many")]
    pub sync: Option<Vec<SyncSpec>>,
    #[serde(default)]
    pub delete: Option<DeleteSpec>,
    #[serde(default)]
    pub wait: Option<WaitSpec>,
    #[serde(default)]
    pub echo: Option<String>,
    #[serde(default)]
    pub line: Option<String>,
}

/// A validated command: exactly one verb, plus common fields.
#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub env: HashMap<String, String>,
    pub condition: Option<String>,
    pub register: Vec<String>,
    pub options: CmdOptions,
    pub verb: Verb,
    /// Populated at playbook load time from the secrets provider, keyed by
    /// the keys listed in `options.secrets` (spec §4.1 "Secrets").
    pub secrets: HashMap<String, String>,
}

impl CommandRaw {
    /// Validate "exactly one verb field set" and produce a [`Command`].
    /// Returns the names of all set verb fields on error, as spec §4.1
    /// requires ("error listing the offending fields").
    pub fn into_command(self) -> Result<Command, String> {
        let mut set: Vec<(&'static str, Verb)> = Vec::new();
        if let Some(s) = self.script.clone() {
            set.push(("script", Verb::Script(s)));
        }
        if let Some(c) = self.copy.clone() {
            set.push(("copy", Verb::Copy(c)));
        }
        if let Some(s) = self.sync.clone() {
            set.push(("sync", Verb::Sync(s)));
        }
        if let Some(d) = self.delete.clone() {
            set.push(("delete", Verb::Delete(d)));
        }
        if let Some(w) = self.wait.clone() {
            if w.timeout == 0 || w.interval == 0 {
                return Err(format!(
                    "command '{}': wait.timeout and wait.interval must be > 0",
                    self.name
                ));
            }
            set.push(("wait", Verb::Wait(w)));
        }
        if let Some(e) = self.echo.clone() {
            set.push(("echo", Verb::Echo(e)));
        }
        if let Some(l) = self.line.clone() {
            set.push(("line", Verb::Echo(l)));
        }

        if set.len() != 1 {
            let names: Vec<&str> = set.iter().map(|(n, _)| *n).collect();
            return Err(format!(
                "command '{}' must set exactly one verb, found {}: {:?}",
                self.name,
                set.len(),
                names
            ));
        }

        let (_, verb) = set.into_iter().next().unwrap();
        Ok(Command {
            name: self.name,
            env: self.env,
            condition: self.condition,
            register: self.register,
            options: self.options,
            verb,
            secrets: HashMap::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_on_positive_and_negative_combine() {
        let opts = CmdOptions {
            only_on: vec!["web1".into(), "!web2".into()],
            ..Default::default()
        };
        assert!(opts.host_allowed(&["web1"]));
        assert!(!opts.host_allowed(&["web2"]));
        assert!(!opts.host_allowed(&["web3"])); // fails positive (no match)
    }

    #[test]
    fn only_on_negative_only_is_none_of() {
        let opts = CmdOptions {
            only_on: vec!["!web2".into()],
            ..Default::default()
        };
        assert!(opts.host_allowed(&["web1"]));
        assert!(!opts.host_allowed(&["web2"]));
    }

    #[test]
    fn copy_accepts_single_or_list() {
        let single: CommandRaw = serde_yaml::from_str(
            "name: c\ncopy:\n  src: a\n  dst: b\n",
        )
        .unwrap();
        assert_eq!(single.copy.unwrap().len(), 1);

        let list: CommandRaw = serde_yaml::from_str(
            "name: c\ncopy:\n  - src: a\n    dst: b\n  - src: c\n    dst: d\n",
        )
        .unwrap();
        assert_eq!(list.copy.unwrap().len(), 2);
    }

    #[test]
    fn exactly_one_verb_enforced() {
        let raw: CommandRaw = serde_yaml::from_str("name: c\nscript: echo hi\necho: hi\n").unwrap();
        assert!(raw.into_command().is_err());

        let raw: CommandRaw = serde_yaml::from_str("name: c\n").unwrap();
        assert!(raw.into_command().is_err());
    }

    #[test]
    fn wait_requires_positive_timeout_and_interval() {
        let raw: CommandRaw =
            serde_yaml::from_str("name: c\nwait:\n  cmd: x\n  timeout: 0\n  interval: 1\n").unwrap();
        assert!(raw.into_command().is_err());
    }
}
