use std::fs;

use tempfile::tempdir;

use crate::agent::table::FileTable;
use crate::agent::types::{FileIndex, FileKind, FileMeta, IndexEntry, RootSpec};
use crate::shared::config::RootSettings;
use crate::shared::hash::etag_from_size_mtime;

fn root_from(json: serde_json::Value) -> RootSpec {
    let settings: RootSettings = serde_json::from_value(json).unwrap();
    RootSpec::from_settings(&settings)
}

fn meta(path: &str, inode: u64, size: u64, mtime: i64, root: &RootSpec) -> FileMeta {
    FileMeta {
        full_path: path.to_string(),
        parent_dir: path.rsplit_once('/').map(|(d, _)| d.to_string()).unwrap_or_default(),
        name: path.rsplit('/').next().unwrap().to_string(),
        size,
        mtime,
        inode,
        file_kind: FileKind::from_name(path),
        content_etag: etag_from_size_mtime(size, mtime),
        owning_root: root.clone(),
        file_index: None,
    }
}

fn one_entry_index(etag: &str) -> FileIndex {
    FileIndex {
        index_etag: etag.to_string(),
        last_index_time: 1735689700,
        time_indexes: vec![IndexEntry { timestamp: 1735689600, offset: 0 }],
    }
}

#[test]
fn unchanged_upsert_keeps_entry_intact() {
    let root = root_from(serde_json::json!({ "path": "/var/log" }));
    let table = FileTable::new();
    table.upsert(meta("/var/log/a.log", 1, 10, 100, &root));
    let etag = table.get("/var/log/a.log").unwrap().content_etag.clone();

    table.attach_index("/var/log/a.log", 1, one_entry_index(&etag));
    table.upsert(meta("/var/log/a.log", 1, 10, 100, &root));

    // Same (inode, size, mtime): nothing changes, index survives.
    assert!(table.get("/var/log/a.log").unwrap().file_index.is_some());
}

#[test]
fn changed_file_preserves_index_for_resume() {
    let root = root_from(serde_json::json!({ "path": "/var/log" }));
    let table = FileTable::new();
    table.upsert(meta("/var/log/a.log", 1, 10, 100, &root));
    let etag = table.get("/var/log/a.log").unwrap().content_etag.clone();
    table.attach_index("/var/log/a.log", 1, one_entry_index(&etag));

    // Appended data: same inode, new size/mtime.
    table.upsert(meta("/var/log/a.log", 1, 20, 200, &root));

    let updated = table.get("/var/log/a.log").unwrap();
    assert_eq!(updated.size, 20);
    assert_eq!(updated.content_etag, etag_from_size_mtime(20, 200));
    assert!(updated.needs_index());
    let index = updated.file_index.expect("index must survive the update");
    assert_eq!(index.index_etag, etag, "stale etag marks the index for resume");
}

#[test]
fn rotation_drops_the_index() {
    let root = root_from(serde_json::json!({ "path": "/var/log" }));
    let table = FileTable::new();
    table.upsert(meta("/var/log/a.log", 1, 10, 100, &root));
    let etag = table.get("/var/log/a.log").unwrap().content_etag.clone();
    table.attach_index("/var/log/a.log", 1, one_entry_index(&etag));

    // Same path, new inode: replacement file.
    table.upsert(meta("/var/log/a.log", 2, 5, 300, &root));

    let replaced = table.get("/var/log/a.log").unwrap();
    assert_eq!(replaced.inode, 2);
    assert!(replaced.file_index.is_none());
}

#[test]
fn attach_index_refuses_stale_inode() {
    let root = root_from(serde_json::json!({ "path": "/var/log" }));
    let table = FileTable::new();
    table.upsert(meta("/var/log/a.log", 2, 10, 100, &root));

    assert!(!table.attach_index("/var/log/a.log", 1, one_entry_index("stale")));
    assert!(table.get("/var/log/a.log").unwrap().file_index.is_none());
}

#[test]
fn list_prefix_applies_all_three_checks() {
    let root = root_from(serde_json::json!({
        "path": "/var/log",
        "prefixpattern": "/var/log.*"
    }));
    let table = FileTable::new();
    table.upsert(meta("/var/log/nginx/access.log", 1, 10, 100, &root));
    table.upsert(meta("/var/log/nginx/error.log", 2, 10, 100, &root));
    table.upsert(meta("/var/log/app.log", 3, 10, 100, &root));

    // Path starts-with filter.
    let listed = table.list_prefix("/var/log/nginx");
    assert_eq!(
        listed.iter().map(|m| m.full_path.as_str()).collect::<Vec<_>>(),
        vec!["/var/log/nginx/access.log", "/var/log/nginx/error.log"]
    );

    // A prefix outside the root directory never matches.
    assert!(table.list_prefix("/opt").is_empty());

    // A prefix rejected by the root's prefix pattern never matches, even
    // if it is a valid string prefix of tracked paths.
    let strict_root = root_from(serde_json::json!({
        "path": "/var/log",
        "prefixpattern": "/var/log/nginx/.*"
    }));
    let strict = FileTable::new();
    strict.upsert(meta("/var/log/app.log", 4, 10, 100, &strict_root));
    assert!(strict.list_prefix("/var/log").is_empty());
}

#[test]
fn remove_missing_drops_deleted_paths_only() {
    let dir = tempdir().unwrap();
    let kept = dir.path().join("kept.log");
    fs::write(&kept, "x").unwrap();

    let root = root_from(serde_json::json!({ "path": dir.path().to_string_lossy() }));
    let table = FileTable::new();
    table.upsert(meta(kept.to_str().unwrap(), 1, 1, 100, &root));
    table.upsert(meta(
        dir.path().join("gone.log").to_str().unwrap(),
        2,
        1,
        100,
        &root,
    ));

    assert_eq!(table.remove_missing(), 1);
    assert_eq!(table.len(), 1);
    assert!(table.get(kept.to_str().unwrap()).is_some());
}
