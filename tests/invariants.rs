//! Invariants not already exercised by a unit test next to their
//! implementation: upload/download byte fidelity (4) and copy's
//! skip-unless-force no-op (6), both driven through `Runner::run` against
//! the fake in-process connector in `tests/common`.

mod common;

use common::{write_playbook, TrackingConnector};
use spot::playbook::{Overrides, Playbook};
use spot::runner::{RunOverrides, Runner};
use spot::secrets::NoneProvider;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

async fn load(dir: &tempfile::TempDir, yaml: &str) -> Playbook {
    let path = write_playbook(dir, yaml);
    Playbook::load(&path, &Overrides::default(), Arc::new(NoneProvider))
        .await
        .expect("playbook loads")
}

/// Invariant 4: an uploaded file's bytes are identical to the source, for
/// content that is not valid UTF-8.
#[tokio::test]
async fn invariant_upload_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("app.bin");
    let dst = dir.path().join("deployed").join("app.bin");
    let content: Vec<u8> = (0u8..=255).collect();
    std::fs::write(&src, &content).unwrap();

    let playbook_yaml = format!(
        "tasks:\n  - name: deploy\n    commands:\n      - name: push-app\n        copy:\n          src: {src}\n          dst: {dst}\n          mkdir: true\n",
        src = src.to_string_lossy(),
        dst = dst.to_string_lossy(),
    );
    let playbook = Arc::new(load(&dir, &playbook_yaml).await);

    let runner = Runner::new(playbook, Arc::new(TrackingConnector::new()), 1, "/tmp");
    let result = runner
        .run(CancellationToken::new(), "deploy", "w1:2210", &RunOverrides::default())
        .await
        .unwrap();
    assert!(result.errors.is_empty());

    let uploaded = std::fs::read(&dst).unwrap();
    assert_eq!(uploaded, content);
}

/// Invariant 6: a rerun with an unchanged source is a no-op unless
/// `force: true`, even when the destination content has since diverged
/// (the check compares size/mtime, not a content hash).
#[tokio::test]
async fn invariant_copy_skips_unless_forced() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("app.txt");
    let dst_dir = dir.path().join("deployed");
    let dst = dst_dir.join("app.txt");
    std::fs::write(&src, b"hello123").unwrap();

    let playbook_yaml = format!(
        "tasks:\n  - name: copy-default\n    commands:\n      - name: push\n        copy:\n          src: {src}\n          dst: {dst}\n          mkdir: true\n  - name: copy-forced\n    commands:\n      - name: push\n        copy:\n          src: {src}\n          dst: {dst}\n          mkdir: true\n          force: true\n",
        src = src.to_string_lossy(),
        dst = dst.to_string_lossy(),
    );
    let playbook = Arc::new(load(&dir, &playbook_yaml).await);
    let runner = Runner::new(playbook, Arc::new(TrackingConnector::new()), 1, "/tmp");

    let first = runner
        .run(CancellationToken::new(), "copy-default", "w1:2211", &RunOverrides::default())
        .await
        .unwrap();
    assert!(first.errors.is_empty());
    assert_eq!(std::fs::read(&dst).unwrap(), b"hello123");

    // Same byte length as the source so the size/mtime proxy reports "same".
    std::fs::write(&dst, b"ZZZZZZZZ").unwrap();

    let second = runner
        .run(CancellationToken::new(), "copy-default", "w1:2211", &RunOverrides::default())
        .await
        .unwrap();
    assert!(second.errors.is_empty());
    assert_eq!(std::fs::read(&dst).unwrap(), b"ZZZZZZZZ", "unforced rerun must not overwrite");

    let forced = runner
        .run(CancellationToken::new(), "copy-forced", "w1:2211", &RunOverrides::default())
        .await
        .unwrap();
    assert!(forced.errors.is_empty());
    assert_eq!(std::fs::read(&dst).unwrap(), b"hello123", "forced rerun overwrites");
}
