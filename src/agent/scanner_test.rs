use std::fs;
use std::os::unix::fs::symlink;

use tempfile::tempdir;

use crate::agent::scanner::scan_roots;
use crate::agent::table::FileTable;
use crate::agent::types::{FileKind, RootSpec};
use crate::shared::config::RootSettings;

fn root_from(json: serde_json::Value) -> RootSpec {
    let settings: RootSettings = serde_json::from_value(json).unwrap();
    RootSpec::from_settings(&settings)
}

#[test]
fn scans_recursively_and_fills_metadata() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("nginx")).unwrap();
    fs::write(dir.path().join("app.log"), "2025-01-01 00:00:00 a\n").unwrap();
    fs::write(dir.path().join("nginx/access.log"), "x\n").unwrap();

    let root = root_from(serde_json::json!({ "path": dir.path().to_string_lossy() }));
    let table = FileTable::new();
    scan_roots(&table, &[root]);

    assert_eq!(table.len(), 2);
    let meta = table
        .get(dir.path().join("app.log").to_str().unwrap())
        .unwrap();
    assert_eq!(meta.size, 22);
    assert!(meta.inode != 0);
    assert!(meta.mtime > 0);
    assert_eq!(meta.file_kind, FileKind::Text);
    assert_eq!(meta.name, "app.log");
    assert!(meta.file_index.is_none());
}

#[test]
fn filename_pattern_filters_basenames() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("app.log"), "x").unwrap();
    fs::write(dir.path().join("app.log.gz"), "x").unwrap();
    fs::write(dir.path().join("notes.txt"), "x").unwrap();

    let root = root_from(serde_json::json!({
        "path": dir.path().to_string_lossy(),
        "namepattern": ".*\\.log(\\.gz)?"
    }));
    let table = FileTable::new();
    scan_roots(&table, &[root]);

    assert_eq!(table.len(), 2);
    assert!(table.get(dir.path().join("notes.txt").to_str().unwrap()).is_none());
    let gz = table
        .get(dir.path().join("app.log.gz").to_str().unwrap())
        .unwrap();
    assert_eq!(gz.file_kind, FileKind::Gzip);
}

#[test]
fn path_pattern_filters_full_paths() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("keep")).unwrap();
    fs::create_dir(dir.path().join("skip")).unwrap();
    fs::write(dir.path().join("keep/a.log"), "x").unwrap();
    fs::write(dir.path().join("skip/b.log"), "x").unwrap();

    let root = root_from(serde_json::json!({
        "path": dir.path().to_string_lossy(),
        "pathpattern": ".*/keep/.*"
    }));
    let table = FileTable::new();
    scan_roots(&table, &[root]);

    assert_eq!(table.len(), 1);
    assert!(table.get(dir.path().join("keep/a.log").to_str().unwrap()).is_some());
}

#[test]
fn symlinks_are_skipped() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("real.log"), "x").unwrap();
    symlink(dir.path().join("real.log"), dir.path().join("alias.log")).unwrap();

    let root = root_from(serde_json::json!({ "path": dir.path().to_string_lossy() }));
    let table = FileTable::new();
    scan_roots(&table, &[root]);

    assert_eq!(table.len(), 1);
    assert!(table.get(dir.path().join("alias.log").to_str().unwrap()).is_none());
}

#[test]
fn missing_root_is_harmless() {
    let root = root_from(serde_json::json!({ "path": "/nonexistent/logsweep-root" }));
    let table = FileTable::new();
    scan_roots(&table, &[root]);
    assert!(table.is_empty());
}

#[test]
fn rescan_detects_changes_and_rotations() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("app.log");
    fs::write(&path, "one\n").unwrap();

    let root = root_from(serde_json::json!({ "path": dir.path().to_string_lossy() }));
    let table = FileTable::new();
    scan_roots(&table, std::slice::from_ref(&root));
    let first = table.get(path.to_str().unwrap()).unwrap();

    // Replace the file: a new inode must land in the table.
    let staging = dir.path().join(".app.log.tmp");
    fs::write(&staging, "rotated\n").unwrap();
    fs::rename(&staging, &path).unwrap();
    scan_roots(&table, std::slice::from_ref(&root));

    let second = table.get(path.to_str().unwrap()).unwrap();
    assert_ne!(first.inode, second.inode);
    assert_eq!(second.size, 8);
}
