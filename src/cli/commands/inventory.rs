//! `spot inventory` — resolve targets into Destinations (spec §4.5 Generator).

use super::resolve_secrets_provider;
use crate::error::Result;
use crate::generator::Generator;
use crate::playbook::{Overrides, Playbook};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
pub struct InventoryArgs {
    /// Playbook file whose targets/inventory should be resolved.
    #[arg(long)]
    pub playbook: PathBuf,

    /// Target name to resolve. Repeatable.
    #[arg(long = "target", action = clap::ArgAction::Append)]
    pub targets: Vec<String>,

    /// Override the inventory location.
    #[arg(long)]
    pub inventory: Option<String>,

    /// Write output to this file instead of stdout.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Minijinja template file to render the resolved Destinations with.
    /// Without this, output is a raw JSON array.
    #[arg(long)]
    pub template: Option<PathBuf>,
}

impl InventoryArgs {
    pub async fn execute(&self) -> Result<i32> {
        let overrides = Overrides {
            user: None,
            inventory: self.inventory.clone(),
            env: Default::default(),
            adhoc_command: None,
        };
        let secrets = resolve_secrets_provider().await?;
        let playbook = Playbook::load(&self.playbook, &overrides, secrets).await?;
        crate::output::install_redactor(playbook.all_secret_values().to_vec());

        let template = match &self.template {
            Some(path) => Some(
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| crate::error::Error::io(format!("reading template '{}'", path.display()), e))?,
            ),
            None => None,
        };

        let generator = Generator::new(&playbook);
        match &self.output {
            Some(path) => {
                let mut file = std::fs::File::create(path)
                    .map_err(|e| crate::error::Error::io(format!("creating '{}'", path.display()), e))?;
                generator.generate(&self.targets, template.as_deref(), &mut file).await?;
            }
            None => {
                let mut stdout = std::io::stdout();
                generator.generate(&self.targets, template.as_deref(), &mut stdout).await?;
            }
        }
        Ok(0)
    }
}
