//! Multi-line script generation and temp-file lifecycle (spec §4.4 step 4,
//! §9 "Temp-file cleanup").
//!
//! True RAII cleanup would require an async `Drop`, which Rust doesn't
//! have; cleanup here is a best-effort delete run on every exit path from
//! [`run_remote_script`] instead, which gives the same observable
//! guarantee without blocking inside `Drop`.

use crate::error::Result;
use crate::executor::{Executor, RunOutput};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Build a `#!/bin/sh` script: `set -e`, one `export` per env/secret
/// assignment, the user's body, then a trailer emitting `setvar NAME=VAL`
/// for every name in `register`, captured back into `Vars`.
pub fn build_script(env: &HashMap<String, String>, body: &str, register: &[String]) -> String {
    let mut out = String::from("#!/bin/sh\nset -e\n");
    for (key, value) in env {
        out.push_str(&format!("export {key}={}\n", shell_quote(value)));
    }
    out.push_str(body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
    for name in register {
        out.push_str(&format!("printf 'setvar {name}=%s\\n' \"${name}\"\n"));
    }
    out
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Parse `setvar NAME=VAL` trailer lines emitted by [`build_script`].
pub fn parse_setvar_lines(lines: &[String]) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in lines {
        if let Some(rest) = line.strip_prefix("setvar ") {
            if let Some((name, value)) = rest.split_once('=') {
                vars.insert(name.to_string(), value.to_string());
            }
        }
    }
    vars
}

/// Upload a generated script to `<remote_temp_dir>/.spot-<rand>/run.sh`,
/// execute it (as `sudo -n sh` when `sudo` is set), and remove the
/// directory regardless of outcome.
pub async fn run_remote_script(
    executor: &mut dyn Executor,
    ctx: CancellationToken,
    remote_temp_dir: &str,
    script: &str,
    sudo: bool,
) -> Result<RunOutput> {
    let run_id = uuid::Uuid::new_v4().simple().to_string();
    let remote_dir = PathBuf::from(remote_temp_dir).join(format!(".spot-{run_id}"));
    let remote_script = remote_dir.join("run.sh");

    let local_dir = std::env::temp_dir().join(format!("spot-script-{run_id}"));
    tokio::fs::create_dir_all(&local_dir).await.ok();
    let local_script = local_dir.join("run.sh");
    tokio::fs::write(&local_script, script).await.map_err(|e| {
        crate::error::Error::io(format!("writing local script '{}'", local_script.display()), e)
    })?;

    let upload_result = executor.upload(&local_script, &remote_script, true).await;
    let _ = tokio::fs::remove_dir_all(&local_dir).await;
    upload_result?;

    let sh = if sudo { "sudo -n sh" } else { "sh" };
    let cmd = format!("chmod +x '{}' && {sh} '{}'", remote_script.display(), remote_script.display());
    let run_result = executor.run(ctx, &cmd).await;
    let _ = executor.delete(&remote_dir, true).await;

    run_result
}
