use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use tracing::{debug, info};

use super::types::{FileIndex, FileMeta};

/// The live map of tracked files, keyed by full path.
///
/// Single-writer / multi-reader. Writers are the scanner (per entry), the
/// index builder (per completed file) and the cache loader; readers are
/// list, search and the cache writer. Guards are never held across await
/// points — every operation clones what it needs and releases the lock.
#[derive(Debug, Default)]
pub struct FileTable {
    inner: RwLock<HashMap<String, FileMeta>>,
}

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scanner upsert with the three-way rule: new path inserts; same inode
    /// with changed `(size, mtime)` updates in place preserving the index;
    /// a new inode under an existing path is a rotation and replaces the
    /// entry wholesale, dropping the old index.
    pub fn upsert(&self, mut incoming: FileMeta) {
        let mut map = self.inner.write().unwrap();
        match map.get_mut(&incoming.full_path) {
            None => {
                info!(target: "logsweep::scan", path = %incoming.full_path, inode = incoming.inode, "Tracking new file");
                map.insert(incoming.full_path.clone(), incoming);
            }
            Some(existing) if existing.inode != incoming.inode => {
                info!(
                    target: "logsweep::scan",
                    path = %incoming.full_path,
                    old_inode = existing.inode,
                    new_inode = incoming.inode,
                    "File rotated, dropping index"
                );
                *existing = incoming;
            }
            Some(existing) => {
                if existing.size != incoming.size || existing.mtime != incoming.mtime {
                    incoming.file_index = existing.file_index.take();
                    debug!(target: "logsweep::scan", path = %incoming.full_path, "File changed, index preserved for resume");
                    *existing = incoming;
                } else {
                    debug!(target: "logsweep::scan", path = %incoming.full_path, "File unchanged");
                }
            }
        }
    }

    pub fn get(&self, path: &str) -> Option<FileMeta> {
        self.inner.read().unwrap().get(path).cloned()
    }

    /// Deep copy of every entry, for the index builder and cache writer.
    pub fn snapshot(&self) -> Vec<FileMeta> {
        self.inner.read().unwrap().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().unwrap().is_empty()
    }

    /// Files visible under `prefix`: the prefix must full-match the owning
    /// root's prefix pattern, begin with the root directory, and be a
    /// string prefix of the file path. All three checks must pass.
    pub fn list_prefix(&self, prefix: &str) -> Vec<FileMeta> {
        let map = self.inner.read().unwrap();
        let mut out: Vec<FileMeta> = map
            .values()
            .filter(|meta| {
                meta.owning_root.matches_prefix(prefix)
                    && prefix.starts_with(&meta.owning_root.root_directory)
                    && meta.full_path.starts_with(prefix)
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| a.full_path.cmp(&b.full_path));
        out
    }

    /// Builder write-back. The index is attached only while the entry is
    /// still the same logical file (path and inode both match); a rotation
    /// that raced the build discards the result.
    pub fn attach_index(&self, path: &str, inode: u64, index: FileIndex) -> bool {
        let mut map = self.inner.write().unwrap();
        match map.get_mut(path) {
            Some(meta) if meta.inode == inode => {
                meta.file_index = Some(index);
                true
            }
            _ => {
                debug!(target: "logsweep::index", path, "File replaced during indexing, result dropped");
                false
            }
        }
    }

    /// Drop entries whose path no longer exists on disk. Entries with an
    /// empty or missing index are kept; only deletion removes a file.
    pub fn remove_missing(&self) -> usize {
        let mut map = self.inner.write().unwrap();
        let before = map.len();
        map.retain(|path, _| {
            let alive = Path::new(path).exists();
            if !alive {
                info!(target: "logsweep::scan", path, "Dropping index for deleted file");
            }
            alive
        });
        before - map.len()
    }
}
