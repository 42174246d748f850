//! Generator: render resolved Destinations as JSON or via a text template
//! (spec §4.5). Pure read of the Playbook; no side effects.

use crate::error::{Error, Result};
use crate::inventory::Destination;
use crate::playbook::Playbook;
use minijinja::Environment;
use std::io::Write;

pub struct Generator<'a> {
    playbook: &'a Playbook,
}

impl<'a> Generator<'a> {
    pub fn new(playbook: &'a Playbook) -> Self {
        Self { playbook }
    }

    async fn resolve(&self, target_names: &[String]) -> Result<Vec<Destination>> {
        let mut all = Vec::new();
        for name in target_names {
            all.extend(self.playbook.target_hosts(name).await?);
        }
        Ok(crate::inventory::dedup_destinations(all))
    }

    fn render_json(destinations: &[Destination]) -> Result<String> {
        serde_json::to_string_pretty(destinations)
            .map_err(|e| Error::Internal(format!("failed to serialize inventory: {e}")))
    }

    fn render_template(destinations: &[Destination], template: &str) -> Result<String> {
        let mut env = Environment::new();
        env.add_template("inventory", template)
            .map_err(|e| Error::Internal(format!("invalid inventory template: {e}")))?;
        let tmpl = env
            .get_template("inventory")
            .map_err(|e| Error::Internal(format!("template lookup failed: {e}")))?;
        tmpl.render(minijinja::context! { destinations => destinations })
            .map_err(|e| Error::Internal(format!("template render failed: {e}")))
    }

    /// Resolve `target_names`, write the result to `out` (raw JSON array if
    /// `template` is `None`, rendered text otherwise), and flush `out`
    /// unconditionally before returning — both output shapes go through the
    /// same write-then-flush path so callers never observe a half-written
    /// stream (spec §9 open question).
    pub async fn generate(
        &self,
        target_names: &[String],
        template: Option<&str>,
        out: &mut dyn Write,
    ) -> Result<()> {
        let destinations = self.resolve(target_names).await?;
        let rendered = match template {
            Some(t) => Self::render_template(&destinations, t)?,
            None => Self::render_json(&destinations)?,
        };
        let result = writeln!(out, "{rendered}").map_err(|e| Error::io("writing inventory output", e));
        out.flush().map_err(|e| Error::io("flushing inventory output", e))?;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playbook::Overrides;
    use crate::secrets::NoneProvider;
    use std::sync::Arc;

    #[tokio::test]
    async fn generate_json_resolves_literal_host() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.yml");
        tokio::fs::write(
            &path,
            "tasks:\n  - name: t1\n    commands:\n      - name: c1\n        script: echo hi\n",
        )
        .await
        .unwrap();
        let playbook = Playbook::load(&path, &Overrides::default(), Arc::new(NoneProvider))
            .await
            .unwrap();
        let gen = Generator::new(&playbook);
        let mut out = Vec::new();
        gen.generate(&["example.com:22".to_string()], None, &mut out)
            .await
            .unwrap();
        assert!(String::from_utf8(out).unwrap().contains("example.com"));
    }

    #[tokio::test]
    async fn generate_template_renders_host_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.yml");
        tokio::fs::write(
            &path,
            "tasks:\n  - name: t1\n    commands:\n      - name: c1\n        script: echo hi\n",
        )
        .await
        .unwrap();
        let playbook = Playbook::load(&path, &Overrides::default(), Arc::new(NoneProvider))
            .await
            .unwrap();
        let gen = Generator::new(&playbook);
        let mut out = Vec::new();
        gen.generate(
            &["example.com:22".to_string()],
            Some("{% for d in destinations %}{{ d.host }}\n{% endfor %}"),
            &mut out,
        )
        .await
        .unwrap();
        assert_eq!(String::from_utf8(out).unwrap().trim(), "example.com");
    }
}
