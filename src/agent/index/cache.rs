use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::agent::error::CacheError;
use crate::agent::table::FileTable;
use crate::agent::types::{FileIndex, FileMeta, RootSpec};

pub const CACHE_FILE_NAME: &str = ".index_cache.json";

/// On-disk shape of one cached entry. Regex state is never persisted; the
/// `root_path` string rebinds the entry to a configured root on load.
#[derive(Debug, Serialize, Deserialize)]
struct CachedFile {
    fullpath: String,
    name: String,
    dir: String,
    size: u64,
    mtime: i64,
    ftype: String,
    etag: String,
    inode: u64,
    root_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_index: Option<FileIndex>,
}

impl CachedFile {
    fn from_meta(meta: &FileMeta) -> Self {
        Self {
            fullpath: meta.full_path.clone(),
            name: meta.name.clone(),
            dir: meta.parent_dir.clone(),
            size: meta.size,
            mtime: meta.mtime,
            ftype: match meta.file_kind {
                crate::agent::types::FileKind::Text => "text".to_string(),
                crate::agent::types::FileKind::Gzip => "gzip".to_string(),
            },
            etag: meta.content_etag.clone(),
            inode: meta.inode,
            root_path: meta.owning_root.root_directory.clone(),
            file_index: meta.file_index.clone(),
        }
    }
}

fn cache_file_path(cache_dir: &Path) -> PathBuf {
    cache_dir.join(CACHE_FILE_NAME)
}

/// Best-effort persist: snapshot under a read lock, write to a temp file,
/// atomically rename over the cache file.
pub fn save(table: &FileTable, cache_dir: &Path) -> Result<usize, CacheError> {
    fs::create_dir_all(cache_dir)?;
    let snapshot = table.snapshot();
    let cached: Vec<CachedFile> = snapshot.iter().map(CachedFile::from_meta).collect();

    let target = cache_file_path(cache_dir);
    let tmp = target.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_vec_pretty(&cached)?)?;
    fs::rename(&tmp, &target)?;

    info!(target: "logsweep::cache", path = %target.display(), entries = cached.len(), "Index cache saved");
    Ok(cached.len())
}

/// Restore cached indexes after the first scan. An entry survives only if
/// its root is still configured and the live table has the same path with
/// the same inode; the cached FileIndex is then rebound onto the live
/// FileMeta. Live entries are never removed.
pub fn load(table: &FileTable, roots: &[RootSpec], cache_dir: &Path) -> Result<usize, CacheError> {
    let target = cache_file_path(cache_dir);
    if !target.exists() {
        debug!(target: "logsweep::cache", path = %target.display(), "No index cache present");
        return Ok(0);
    }

    let raw = fs::read(&target)?;
    let cached: Vec<CachedFile> = serde_json::from_slice(&raw)?;

    let known_roots: HashMap<&str, &RootSpec> = roots
        .iter()
        .map(|r| (r.root_directory.as_str(), r))
        .collect();

    let mut restored = 0;
    for entry in cached {
        if !known_roots.contains_key(entry.root_path.as_str()) {
            warn!(target: "logsweep::cache", path = %entry.fullpath, root = %entry.root_path, "Cached root no longer configured, dropping entry");
            continue;
        }
        let Some(index) = entry.file_index else {
            continue;
        };
        let Some(live) = table.get(&entry.fullpath) else {
            warn!(target: "logsweep::cache", path = %entry.fullpath, "Cached file filtered out by current scan, dropping entry");
            continue;
        };
        if live.inode != entry.inode {
            info!(target: "logsweep::cache", path = %entry.fullpath, "Cached inode differs (rotation), dropping index");
            continue;
        }
        if table.attach_index(&entry.fullpath, entry.inode, index) {
            restored += 1;
        }
    }

    info!(target: "logsweep::cache", path = %target.display(), restored, "Index cache loaded");
    Ok(restored)
}
