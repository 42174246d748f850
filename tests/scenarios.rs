//! End-to-end scenarios A-F and the concurrency/cancellation invariants
//! (9/10), run against the fake in-process `TrackingConnector` (real local
//! shell, no network/SSH) defined in `tests/common`.

mod common;

use common::{write_playbook, TrackingConnector};
use spot::playbook::{Overrides, Playbook};
use spot::runner::{RunOverrides, Runner};
use spot::secrets::NoneProvider;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

async fn load(dir: &tempfile::TempDir, yaml: &str) -> Playbook {
    let path = write_playbook(dir, yaml);
    Playbook::load(&path, &Overrides::default(), Arc::new(NoneProvider))
        .await
        .expect("playbook loads")
}

/// Scenario A: single-host script runs and produces no errors.
#[tokio::test]
async fn scenario_a_single_host_script_echo() {
    let dir = tempfile::tempdir().unwrap();
    let playbook = load(
        &dir,
        r#"
tasks:
  - name: greet
    commands:
      - name: say-hello
        script: echo hello-from-{SPOT_REMOTE_NAME}
"#,
    )
    .await;

    let runner = Runner::new(Arc::new(playbook), Arc::new(TrackingConnector::new()), 5, "/tmp");
    let result = runner
        .run(CancellationToken::new(), "greet", "w1:2201", &RunOverrides::default())
        .await
        .unwrap();

    assert!(result.errors.is_empty());
    assert_eq!(result.hosts, vec!["w1:2201".to_string()]);
    assert_eq!(result.commands, vec!["say-hello".to_string()]);
}

/// Scenario B: sync with deletion removes the remote-only file once
/// `delete: true`, and a second run with no changes is a no-op (invariant 3).
#[tokio::test]
async fn scenario_b_sync_with_deletion() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::create_dir_all(&dst).unwrap();
    std::fs::write(src.join("keep.txt"), b"keep").unwrap();
    std::fs::write(dst.join("stale.txt"), b"stale").unwrap();

    let playbook_yaml = format!(
        r#"
tasks:
  - name: deploy
    commands:
      - name: sync-files
        sync:
          src: {src:?}
          dst: {dst:?}
          delete: true
"#,
        src = src.to_string_lossy(),
        dst = dst.to_string_lossy(),
    );
    let playbook = Arc::new(load(&dir, &playbook_yaml).await);

    let runner = Runner::new(playbook.clone(), Arc::new(TrackingConnector::new()), 1, "/tmp");
    let result = runner
        .run(CancellationToken::new(), "deploy", "w1:2202", &RunOverrides::default())
        .await
        .unwrap();
    assert!(result.errors.is_empty());
    assert!(dst.join("keep.txt").exists());
    assert!(!dst.join("stale.txt").exists());

    // rerun is idempotent: no errors, nothing left to change.
    let result2 = runner
        .run(CancellationToken::new(), "deploy", "w1:2202", &RunOverrides::default())
        .await
        .unwrap();
    assert!(result2.errors.is_empty());
}

/// Scenario C: a task registers a host, a later `Runner::run` call resolves
/// `$NEXTHOST` as its target via the same substitution path `target_hosts`
/// uses for literal names (spec §4.4 "Dynamic targets").
#[tokio::test]
async fn scenario_c_dynamic_target_via_registered_variable() {
    let dir = tempfile::tempdir().unwrap();
    let playbook = Arc::new(
        load(
            &dir,
            r#"
tasks:
  - name: discover
    commands:
      - name: pick-host
        script: NEXTHOST=127.0.0.1:2301
        register: ["NEXTHOST"]
  - name: deploy
    commands:
      - name: say-hello
        script: echo hi
"#,
        )
        .await,
    );

    let connector = Arc::new(TrackingConnector::new());
    let runner = Runner::new(playbook.clone(), connector, 1, "/tmp");

    let discover = runner
        .run(CancellationToken::new(), "discover", "seed:2300", &RunOverrides::default())
        .await
        .unwrap();
    assert!(discover.errors.is_empty());
    assert_eq!(discover.vars.get("NEXTHOST").map(String::as_str), Some("127.0.0.1:2301"));

    let deploy = runner
        .run(CancellationToken::new(), "deploy", "$NEXTHOST", &RunOverrides::default())
        .await
        .unwrap();
    assert!(deploy.errors.is_empty());
    assert_eq!(deploy.hosts, vec!["127.0.0.1:2301".to_string()]);
}

/// Scenario D: a failing command triggers `on_error`, with `{SPOT_ERROR}`
/// substituted into the hook and the hook run locally.
#[tokio::test]
async fn scenario_d_on_error_hook_runs_with_spot_error() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("marker.txt");
    let playbook_yaml = format!(
        "tasks:\n  - name: deploy\n    on_error: echo \"{{SPOT_ERROR}}\" > {marker}\n    commands:\n      - name: fail\n        script: exit 7\n",
        marker = marker.to_string_lossy(),
    );
    let playbook = Arc::new(load(&dir, &playbook_yaml).await);

    let runner = Runner::new(playbook, Arc::new(TrackingConnector::new()), 1, "/tmp");
    let result = runner
        .run(CancellationToken::new(), "deploy", "w1:2203", &RunOverrides::default())
        .await
        .unwrap();

    assert!(!result.errors.is_empty());
    let contents = tokio::fs::read_to_string(&marker).await.expect("on_error hook wrote marker");
    assert!(contents.contains("exit code Some(7)"), "hook output: {contents}");
}

/// Scenario E / invariant 10: cancellation mid-run returns quickly and every
/// opened `Executor` is closed.
#[tokio::test]
async fn scenario_e_cancellation_returns_promptly_and_closes_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let playbook = Arc::new(
        load(
            &dir,
            r#"
tasks:
  - name: slow
    commands:
      - name: sleep-forever
        script: sleep 30
"#,
        )
        .await,
    );

    let connector = Arc::new(TrackingConnector::new());
    let runner = Runner::new(playbook, connector.clone(), 1, "/tmp");

    let ctx = CancellationToken::new();
    let cancel_ctx = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel_ctx.cancel();
    });

    let started = tokio::time::Instant::now();
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        runner.run(ctx, "slow", "w1:2204", &RunOverrides::default()),
    )
    .await
    .expect("run returned before the outer test timeout")
    .unwrap();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(!result.errors.is_empty());
    assert_eq!(connector.peak(), 1);
}

/// Invariant 9: with concurrency N and H hosts, no more than N sessions are
/// ever open at once.
#[tokio::test]
async fn invariant_bounded_concurrency() {
    let dir = tempfile::tempdir().unwrap();
    let playbook = Arc::new(
        load(
            &dir,
            r#"
tasks:
  - name: deploy
    commands:
      - name: pause
        script: sleep 1
targets:
  fleet:
    hosts:
      - { host: h1, port: 1 }
      - { host: h2, port: 2 }
      - { host: h3, port: 3 }
      - { host: h4, port: 4 }
      - { host: h5, port: 5 }
"#,
        )
        .await,
    );

    let connector = Arc::new(TrackingConnector::new());
    let runner = Runner::new(playbook, connector.clone(), 2, "/tmp");

    let result = runner
        .run(CancellationToken::new(), "deploy", "fleet", &RunOverrides::default())
        .await
        .unwrap();

    assert!(result.errors.is_empty());
    assert_eq!(result.hosts.len(), 5);
    assert!(connector.peak() <= 2, "peak concurrent sessions was {}", connector.peak());
}

/// Scenario F: secret values installed via the redactor never appear in
/// stdout/stderr output.
#[tokio::test]
async fn scenario_f_secret_redaction() {
    spot::output::install_redactor(vec!["s3cr3t-token".to_string()]);
    let redacted = spot::output::redact("the token is s3cr3t-token end");
    assert!(!redacted.contains("s3cr3t-token"));
    assert!(redacted.contains("***"));
}
