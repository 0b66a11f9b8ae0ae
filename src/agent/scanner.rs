use std::os::unix::fs::MetadataExt;
use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::table::FileTable;
use super::types::{split_path, FileKind, FileMeta, RootSpec};
use crate::shared::hash::etag_from_size_mtime;

/// One scan pass over every configured root. Takes a read snapshot of the
/// root list up front; mutations go through per-entry table upserts.
pub fn scan_roots(table: &FileTable, roots: &[RootSpec]) {
    for root in roots {
        scan_root(table, root);
    }
}

/// Walk one root recursively, filter by path/name patterns and upsert
/// survivors. Symlinks, unreadable entries and non-regular files are
/// skipped; a single bad entry never aborts the pass.
pub fn scan_root(table: &FileTable, root: &RootSpec) {
    let root_dir = Path::new(&root.root_directory);
    if !root_dir.is_dir() {
        debug!(target: "logsweep::scan", root = %root.root_directory, "Root missing or not a directory");
        return;
    }

    for entry in WalkDir::new(root_dir).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(target: "logsweep::scan", root = %root.root_directory, error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if entry.path_is_symlink() || !entry.file_type().is_file() {
            continue;
        }

        let full_path = entry.path().to_string_lossy().into_owned();
        let (parent_dir, name) = split_path(entry.path());
        if !root.matches_path(&full_path) || !root.matches_name(&name) {
            continue;
        }

        let meta = match entry.metadata() {
            Ok(meta) => meta,
            Err(e) => {
                warn!(target: "logsweep::scan", path = %full_path, error = %e, "stat failed, skipping");
                continue;
            }
        };

        let size = meta.len();
        let mtime = meta.mtime();
        table.upsert(FileMeta {
            content_etag: etag_from_size_mtime(size, mtime),
            file_kind: FileKind::from_name(&name),
            full_path,
            parent_dir,
            name,
            size,
            mtime,
            inode: meta.ino(),
            owning_root: root.clone(),
            file_index: None,
        });
    }
}
