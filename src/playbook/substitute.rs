//! Runtime variable substitution (spec §4.1).
//!
//! Substitution is textual and happens on a deep copy of the command just
//! before it is dispatched to a concrete host; the original playbook is
//! never mutated.

use super::command::{Command, CopySpec, DeleteSpec, SyncSpec, Verb, WaitSpec};
use std::collections::HashMap;

/// The five/six runtime placeholders described in spec §4.1/§6.
#[derive(Debug, Clone, Default)]
pub struct SubstitutionContext {
    pub remote_host: String,
    pub remote_name: String,
    pub remote_user: String,
    pub command: String,
    pub task: String,
    /// Only valid inside `on_error` (spec §6).
    pub error: Option<String>,
    /// Cross-task registered variables (last-writer-wins across hosts).
    pub register: HashMap<String, String>,
}

impl SubstitutionContext {
    /// Substitute `{SPOT_*}` placeholders and `$name`/`${name}` registered
    /// variables in a single string.
    pub fn apply(&self, input: &str) -> String {
        let mut out = input
            .replace("{SPOT_REMOTE_HOST}", &self.remote_host)
            .replace("{SPOT_REMOTE_NAME}", &self.remote_name)
            .replace("{SPOT_REMOTE_USER}", &self.remote_user)
            .replace("{SPOT_COMMAND}", &self.command)
            .replace("{SPOT_TASK}", &self.task);
        if let Some(err) = &self.error {
            out = out.replace("{SPOT_ERROR}", err);
        }
        substitute_registered(&out, &self.register)
    }
}

/// Replace `$name` and `${name}` occurrences with entries from `register`.
/// Longer names are tried first so `$name` inside `${name_extra}` doesn't
/// shadow the braced form.
fn substitute_registered(input: &str, register: &HashMap<String, String>) -> String {
    let mut names: Vec<&String> = register.keys().collect();
    names.sort_by_key(|b| std::cmp::Reverse(b.len()));

    let mut out = input.to_string();
    for name in names {
        let value = &register[name];
        out = out.replace(&format!("${{{name}}}"), value);
        out = replace_bare_var(&out, name, value);
    }
    out
}

/// Replace `$name` only when not immediately followed by an identifier
/// character (so `$host2` is not partially replaced by a substitution for
/// `$host`).
fn replace_bare_var(input: &str, name: &str, value: &str) -> String {
    let needle = format!("${name}");
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find(&needle) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + needle.len()..];
        let boundary = after
            .chars()
            .next()
            .map(|c| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(true);
        if boundary {
            out.push_str(value);
        } else {
            out.push_str(&needle);
        }
        rest = after;
    }
    out.push_str(rest);
    out
}

impl SubstitutionContext {
    /// Produce a substituted deep copy of `cmd` for dispatch on one host.
    pub fn substitute_command(&self, cmd: &Command) -> Command {
        let mut out = cmd.clone();
        out.env = cmd
            .env
            .iter()
            .map(|(k, v)| (k.clone(), self.apply(v)))
            .collect();
        out.verb = match &cmd.verb {
            Verb::Script(s) => Verb::Script(self.apply(s)),
            Verb::Echo(s) => Verb::Echo(self.apply(s)),
            Verb::Delete(d) => Verb::Delete(DeleteSpec {
                path: self.apply(&d.path),
                recursive: d.recursive,
            }),
            Verb::Wait(w) => Verb::Wait(WaitSpec {
                cmd: self.apply(&w.cmd),
                timeout: w.timeout,
                interval: w.interval,
            }),
            Verb::Copy(items) => Verb::Copy(
                items
                    .iter()
                    .map(|c| CopySpec {
                        src: self.apply(&c.src),
                        dst: self.apply(&c.dst),
                        mkdir: c.mkdir,
                        force: c.force,
                    })
                    .collect(),
            ),
            Verb::Sync(items) => Verb::Sync(
                items
                    .iter()
                    .map(|s| SyncSpec {
                        src: self.apply(&s.src),
                        dst: self.apply(&s.dst),
                        delete: s.delete,
                        // Exclude patterns are never substituted (spec §9
                        // open-question resolution, adopted verbatim).
                        exclude: s.exclude.clone(),
                    })
                    .collect(),
            ),
        };
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playbook::command::CmdOptions;

    fn ctx() -> SubstitutionContext {
        let mut register = HashMap::new();
        register.insert("host".to_string(), "example.com:22".to_string());
        SubstitutionContext {
            remote_host: "10.0.0.1".into(),
            remote_name: "web-1".into(),
            remote_user: "deploy".into(),
            command: "echo hi".into(),
            task: "t1".into(),
            error: None,
            register,
        }
    }

    #[test]
    fn placeholders_replaced() {
        let c = ctx();
        assert_eq!(
            c.apply("host={SPOT_REMOTE_HOST} name={SPOT_REMOTE_NAME} user={SPOT_REMOTE_USER}"),
            "host=10.0.0.1 name=web-1 user=deploy"
        );
    }

    #[test]
    fn registered_braced_and_bare_both_work() {
        let c = ctx();
        assert_eq!(c.apply("target=${host}"), "target=example.com:22");
        assert_eq!(c.apply("target=$host"), "target=example.com:22");
    }

    #[test]
    fn bare_var_does_not_clobber_longer_name() {
        let mut register = HashMap::new();
        register.insert("host".to_string(), "SHORT".to_string());
        register.insert("host2".to_string(), "LONG".to_string());
        let c = SubstitutionContext {
            register,
            ..Default::default()
        };
        assert_eq!(c.apply("$host2"), "LONG");
        assert_eq!(c.apply("$host"), "SHORT");
    }

    #[test]
    fn error_only_substituted_when_set() {
        let mut c = ctx();
        assert_eq!(c.apply("{SPOT_ERROR}"), "{SPOT_ERROR}");
        c.error = Some("bad".into());
        assert_eq!(c.apply("{SPOT_ERROR}"), "bad");
    }

    #[test]
    fn sync_excludes_not_substituted() {
        let c = ctx();
        let cmd = Command {
            name: "s".into(),
            env: HashMap::new(),
            condition: None,
            register: vec![],
            options: CmdOptions::default(),
            verb: Verb::Sync(vec![SyncSpec {
                src: "./{SPOT_TASK}".into(),
                dst: "/r".into(),
                delete: false,
                exclude: vec!["{SPOT_TASK}.log".into()],
            }]),
            secrets: HashMap::new(),
        };
        let substituted = c.substitute_command(&cmd);
        if let Verb::Sync(items) = &substituted.verb {
            assert_eq!(items[0].src, "./t1");
            assert_eq!(items[0].exclude[0], "{SPOT_TASK}.log");
        } else {
            panic!("expected sync verb");
        }
    }
}
