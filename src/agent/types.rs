use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::shared::config::RootSettings;

/// A configured source of log files. Pattern regexes use anchored
/// full-match semantics; an absent pattern matches everything.
#[derive(Debug, Clone)]
pub struct RootSpec {
    pub root_directory: String,
    pub filename_pattern: Option<Regex>,
    pub path_pattern: Option<Regex>,
    pub prefix_pattern: Option<Regex>,
    pub time_format_pattern: Option<Regex>,
    pub max_days: u32,
}

impl RootSpec {
    pub fn from_settings(settings: &RootSettings) -> Self {
        Self {
            root_directory: settings.path.clone(),
            filename_pattern: compile_anchored(settings.namepattern.as_deref(), "namepattern"),
            path_pattern: compile_anchored(settings.pathpattern.as_deref(), "pathpattern"),
            prefix_pattern: compile_anchored(settings.prefixpattern.as_deref(), "prefixpattern"),
            time_format_pattern: compile_anchored(
                settings.time_format_pattern.as_deref(),
                "time_format_pattern",
            ),
            max_days: settings.maxdays,
        }
    }

    pub fn matches_name(&self, name: &str) -> bool {
        self.filename_pattern
            .as_ref()
            .map(|re| re.is_match(name))
            .unwrap_or(true)
    }

    pub fn matches_path(&self, path: &str) -> bool {
        self.path_pattern
            .as_ref()
            .map(|re| re.is_match(path))
            .unwrap_or(true)
    }

    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.prefix_pattern
            .as_ref()
            .map(|re| re.is_match(prefix))
            .unwrap_or(true)
    }
}

/// Compile an optional pattern wrapped as `^(?:pat)$`. A bad pattern is
/// logged and degrades to match-everything, so one misconfigured root
/// cannot take the scanner down.
fn compile_anchored(pattern: Option<&str>, field: &str) -> Option<Regex> {
    let pattern = pattern?;
    if pattern.is_empty() {
        return None;
    }
    match Regex::new(&format!("^(?:{pattern})$")) {
        Ok(re) => Some(re),
        Err(e) => {
            warn!(target: "logsweep::scan", field, pattern, error = %e, "Bad root pattern, ignoring");
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Text,
    Gzip,
}

impl FileKind {
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".gz") {
            FileKind::Gzip
        } else {
            FileKind::Text
        }
    }
}

/// One sparse index entry: a timestamp bucket and the starting byte offset
/// of a line (uncompressed bytes for gzip files).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub timestamp: i64,
    pub offset: u64,
}

/// Sparse time index over one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileIndex {
    /// The content etag that was current when this index was built.
    pub index_etag: String,
    pub last_index_time: i64,
    pub time_indexes: Vec<IndexEntry>,
}

impl FileIndex {
    pub fn first_timestamp(&self) -> Option<i64> {
        self.time_indexes.first().map(|e| e.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.time_indexes.last().map(|e| e.timestamp)
    }
}

/// One live on-disk file tracked by the table.
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub full_path: String,
    pub parent_dir: String,
    pub name: String,
    pub size: u64,
    pub mtime: i64,
    pub inode: u64,
    pub file_kind: FileKind,
    pub content_etag: String,
    pub owning_root: RootSpec,
    pub file_index: Option<FileIndex>,
}

impl FileMeta {
    /// Whether the index builder owes this file a pass.
    pub fn needs_index(&self) -> bool {
        match &self.file_index {
            None => true,
            Some(idx) => idx.index_etag != self.content_etag,
        }
    }
}

/// Index emission cadence.
#[derive(Debug, Clone, Copy)]
pub struct IndexPolicy {
    pub interval_secs: i64,
    pub count_threshold: usize,
}

impl Default for IndexPolicy {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            count_threshold: 50_000,
        }
    }
}

pub fn split_path(path: &Path) -> (String, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    (dir, name)
}
