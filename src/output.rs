//! Host-prefixed streaming writer (spec §4.3 "Output streaming"). Every
//! line emitted here is redacted against the installed secret set before
//! it reaches the terminal (spec §8 invariant 8).

use colored::{Color, Colorize};
use parking_lot::RwLock;
use std::sync::OnceLock;

static SECRETS: OnceLock<RwLock<Vec<String>>> = OnceLock::new();

fn secrets() -> &'static RwLock<Vec<String>> {
    SECRETS.get_or_init(|| RwLock::new(Vec::new()))
}

/// Install the full set of secret values to redact from subsequent
/// output (called once after [`crate::playbook::Playbook::load`]).
pub fn install_redactor(values: Vec<String>) {
    let mut guard = secrets().write();
    *guard = values.into_iter().filter(|v| !v.is_empty()).collect();
}

pub fn redact(line: &str) -> String {
    let guard = secrets().read();
    let mut out = line.to_string();
    for secret in guard.iter() {
        if out.contains(secret.as_str()) {
            out = out.replace(secret.as_str(), "***");
        }
    }
    out
}

const PALETTE: &[Color] = &[
    Color::Cyan,
    Color::Magenta,
    Color::Yellow,
    Color::Green,
    Color::Blue,
    Color::BrightCyan,
];

fn color_for(host: &str) -> Color {
    let sum: usize = host.bytes().map(|b| b as usize).sum();
    PALETTE[sum % PALETTE.len()]
}

/// Emit one line of remote/local output, prefixed with the host label
/// and redacted.
pub fn emit(host: &str, line: &str) {
    let redacted = redact(line);
    println!("{} {}", format!("[{host}]").color(color_for(host)).bold(), redacted);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redact_replaces_installed_secrets() {
        install_redactor(vec!["s3cr3t".to_string()]);
        assert_eq!(redact("password is s3cr3t today"), "password is *** today");
        install_redactor(vec![]);
    }
}
