//! Passphrase prompting, isolated behind a trait so the Connector remains
//! testable without a controlling terminal (spec §9).

use dialoguer::{theme::ColorfulTheme, Password};
use std::io::IsTerminal;

/// Prompts the operator for a private-key passphrase.
pub trait AuthPrompt: Send + Sync {
    fn prompt_passphrase(&self, key_path: &str) -> Option<String>;
}

/// Prompts on the controlling terminal via `dialoguer`; returns `None`
/// when stdin isn't a TTY (non-interactive runs never block on input).
pub struct TerminalAuthPrompt;

impl AuthPrompt for TerminalAuthPrompt {
    fn prompt_passphrase(&self, key_path: &str) -> Option<String> {
        if !std::io::stdin().is_terminal() {
            return None;
        }
        Password::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Passphrase for {key_path}"))
            .allow_empty_password(true)
            .interact()
            .ok()
    }
}

#[cfg(test)]
pub struct StaticAuthPrompt(pub Option<String>);

#[cfg(test)]
impl AuthPrompt for StaticAuthPrompt {
    fn prompt_passphrase(&self, _key_path: &str) -> Option<String> {
        self.0.clone()
    }
}
