//! Incremental directory sync: diff computation and glob exclusion (spec
//! §4.3 "Sync", §8 invariant 3).

use crate::error::{Error, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Relative path -> (size, mtime unix seconds).
pub type FileStats = BTreeMap<String, (u64, i64)>;

/// mtimes within this many seconds count as equal; `find`/`stat` give
/// second resolution and the `touch` restore format is minute/second.
const MTIME_TOLERANCE_SECS: i64 = 1;

pub fn build_excludes(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::Internal(format!("invalid sync exclude pattern '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| Error::Internal(format!("failed to compile sync exclude set: {e}")))
}

/// Walk `local_dir` and collect relative-path -> (size, mtime) for every
/// file not matched by `excludes`.
pub fn local_file_stats(local_dir: &Path, excludes: &GlobSet) -> Result<FileStats> {
    let mut stats = FileStats::new();
    for entry in walkdir::WalkDir::new(local_dir)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(local_dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        if excludes.is_match(&rel) {
            continue;
        }
        let meta = entry
            .metadata()
            .map_err(|e| Error::Internal(format!("stat failed for {rel}: {e}")))?;
        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        stats.insert(rel, (meta.len(), mtime));
    }
    Ok(stats)
}

/// Parse `find <dir> -type f -exec stat -c '%n:%s:%Y' {} \;` output lines
/// of the form `path:size:mtimeEpoch`, relative to `remote_dir`.
pub fn parse_remote_stats(output: &str, remote_dir: &Path) -> FileStats {
    let mut stats = FileStats::new();
    let prefix = remote_dir.to_string_lossy().trim_end_matches('/').to_string();
    for line in output.lines() {
        let mut parts = line.rsplitn(3, ':');
        let mtime = match parts.next().and_then(|s| s.parse::<i64>().ok()) {
            Some(m) => m,
            None => continue,
        };
        let size = match parts.next().and_then(|s| s.parse::<u64>().ok()) {
            Some(s) => s,
            None => continue,
        };
        let path = match parts.next() {
            Some(p) => p,
            None => continue,
        };
        let rel = path
            .strip_prefix(&prefix)
            .unwrap_or(path)
            .trim_start_matches('/')
            .to_string();
        if rel.is_empty() {
            continue;
        }
        stats.insert(rel, (size, mtime));
    }
    stats
}

pub struct SyncPlan {
    /// Relative paths to upload, sorted.
    pub updated: Vec<String>,
    /// Relative paths present only remotely, sorted (only removed if
    /// `delete: true`).
    pub deleted: Vec<String>,
}

/// Diff local vs remote file properties (spec §4.3, §8 invariants 3/6).
pub fn plan(local: &FileStats, remote: &FileStats, excludes: &GlobSet) -> SyncPlan {
    let mut updated = Vec::new();
    for (path, (size, mtime)) in local {
        match remote.get(path) {
            None => updated.push(path.clone()),
            Some((rsize, rmtime)) => {
                if size != rsize || (mtime - rmtime).abs() > MTIME_TOLERANCE_SECS {
                    updated.push(path.clone());
                }
            }
        }
    }
    updated.sort();

    let mut deleted: Vec<String> = remote
        .keys()
        .filter(|path| !local.contains_key(*path) && !excludes.is_match(path.as_str()))
        .cloned()
        .collect();
    deleted.sort();

    SyncPlan { updated, deleted }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_detects_new_changed_and_deleted() {
        let mut local = FileStats::new();
        local.insert("a.txt".into(), (4, 1000));
        local.insert("b.txt".into(), (4, 1000));

        let mut remote = FileStats::new();
        remote.insert("a.txt".into(), (4, 1000));
        remote.insert("c.txt".into(), (10, 2000));

        let excludes = build_excludes(&[]).unwrap();
        let result = plan(&local, &remote, &excludes);
        assert_eq!(result.updated, vec!["b.txt".to_string()]);
        assert_eq!(result.deleted, vec!["c.txt".to_string()]);
    }

    #[test]
    fn mtime_within_tolerance_is_not_updated() {
        let mut local = FileStats::new();
        local.insert("a.txt".into(), (4, 1000));
        let mut remote = FileStats::new();
        remote.insert("a.txt".into(), (4, 1001));

        let excludes = build_excludes(&[]).unwrap();
        let result = plan(&local, &remote, &excludes);
        assert!(result.updated.is_empty());
    }

    #[test]
    fn rerun_with_no_changes_is_dry() {
        let mut stats = FileStats::new();
        stats.insert("a.txt".into(), (4, 1000));
        let excludes = build_excludes(&[]).unwrap();
        let result = plan(&stats, &stats, &excludes);
        assert!(result.updated.is_empty());
        assert!(result.deleted.is_empty());
    }

    #[test]
    fn excluded_paths_are_never_deleted() {
        let local = FileStats::new();
        let mut remote = FileStats::new();
        remote.insert("cache/tmp.log".into(), (1, 1));
        let excludes = build_excludes(&["cache/*".to_string()]).unwrap();
        let result = plan(&local, &remote, &excludes);
        assert!(result.deleted.is_empty());
    }

    #[test]
    fn parse_remote_stats_extracts_relative_paths() {
        let output = "/r/a.txt:4:1690000000\n/r/sub/b.txt:10:1690000001\n";
        let stats = parse_remote_stats(output, Path::new("/r"));
        assert_eq!(stats.get("a.txt"), Some(&(4, 1690000000)));
        assert_eq!(stats.get("sub/b.txt"), Some(&(10, 1690000001)));
    }
}
