use std::fs::File;
use std::path::Path;
use std::time::Instant;

use memmap2::Mmap;
use tracing::{debug, error, info};

use crate::agent::error::IndexError;
use crate::agent::table::FileTable;
use crate::agent::types::{FileIndex, FileKind, FileMeta, IndexEntry, IndexPolicy};
use crate::shared::timefmt::TimeExtractor;

use super::gzip_stream::GzipLineReader;

/// Emission state shared by the text and gzip paths.
///
/// A new entry is recorded for the first parseable line, then whenever the
/// bucket advances by at least one interval or the line count since the
/// last entry reaches the threshold. The last parseable line is appended as
/// an end-of-stream sentinel unless it is already the final entry.
struct EmitState {
    entries: Vec<IndexEntry>,
    last_bucket: i64,
    lines_since_last: usize,
    skipped_lines: usize,
    last_line: Option<IndexEntry>,
}

impl EmitState {
    fn new() -> Self {
        Self {
            entries: Vec::with_capacity(1024),
            last_bucket: 0,
            lines_since_last: 0,
            skipped_lines: 0,
            last_line: None,
        }
    }

    /// Continue an existing index: keep everything but the sentinel (it is
    /// re-emitted at the new end of stream) and restart the cadence at the
    /// sentinel's bucket.
    fn resume(index: &FileIndex) -> Self {
        let mut state = Self::new();
        if let Some(last) = index.time_indexes.last() {
            state.last_bucket = last.timestamp;
            state
                .entries
                .extend_from_slice(&index.time_indexes[..index.time_indexes.len() - 1]);
        }
        state
    }

    fn observe(&mut self, ts: i64, offset: u64, policy: &IndexPolicy) {
        let bucket = ts - ts.rem_euclid(policy.interval_secs);
        self.last_line = Some(IndexEntry {
            timestamp: bucket,
            offset,
        });
        self.lines_since_last += 1;

        let first = self.last_bucket == 0;
        if first
            || bucket >= self.last_bucket + policy.interval_secs
            || self.lines_since_last >= policy.count_threshold
        {
            self.entries.push(IndexEntry {
                timestamp: bucket,
                offset,
            });
            self.last_bucket = bucket;
            if !first {
                self.lines_since_last = 0;
            }
        }
    }

    fn finish(mut self, etag: &str) -> FileIndex {
        if let Some(last) = self.last_line {
            if self.entries.last() != Some(&last) {
                self.entries.push(last);
            }
        }
        FileIndex {
            index_etag: etag.to_string(),
            last_index_time: chrono::Utc::now().timestamp(),
            time_indexes: self.entries,
        }
    }
}

/// Bring every tracked file's index up to date with its content etag.
/// Returns how many indexes changed (the cache writer keys off this).
pub fn update_indexes(table: &FileTable, policy: &IndexPolicy, extractor: &TimeExtractor) -> usize {
    let mut updated = 0;
    for meta in table.snapshot() {
        if !meta.needs_index() {
            continue;
        }
        let started = Instant::now();
        match build_file_index(&meta, policy, extractor) {
            Ok(index) => {
                info!(
                    target: "logsweep::index",
                    path = %meta.full_path,
                    entries = index.time_indexes.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Indexed file"
                );
                if table.attach_index(&meta.full_path, meta.inode, index) {
                    updated += 1;
                }
            }
            Err(e) => {
                error!(target: "logsweep::index", path = %meta.full_path, error = %e, "Index update failed, skipping file");
            }
        }
    }
    updated
}

/// Build or extend the sparse index for one file.
pub fn build_file_index(
    meta: &FileMeta,
    policy: &IndexPolicy,
    extractor: &TimeExtractor,
) -> Result<FileIndex, IndexError> {
    match meta.file_kind {
        FileKind::Text => build_text(meta, policy, extractor),
        FileKind::Gzip => build_gzip(meta, policy, extractor),
    }
}

fn build_text(
    meta: &FileMeta,
    policy: &IndexPolicy,
    extractor: &TimeExtractor,
) -> Result<FileIndex, IndexError> {
    let file = File::open(&meta.full_path)?;
    let file_size = file.metadata()?.len();

    let mut state = EmitState::new();
    let mut line_start: usize = 0;
    if let Some(index) = &meta.file_index {
        if let Some(last) = index.time_indexes.last() {
            if last.offset < file_size {
                state = EmitState::resume(index);
                line_start = last.offset as usize;
            }
            // A shrunken file is re-indexed from scratch.
        }
    }

    if file_size == 0 {
        return Ok(state.finish(&meta.content_etag));
    }

    let mmap = unsafe { Mmap::map(&file)? };
    let data = &mmap[..];

    while line_start < data.len() {
        let Some(nl) = data[line_start..].iter().position(|&b| b == b'\n') else {
            // Trailing fragment without a newline is not yet a line.
            break;
        };
        let line_end = line_start + nl;
        let line = String::from_utf8_lossy(&data[line_start..line_end]);
        match extractor.extract(&line) {
            0 => state.skipped_lines += 1,
            ts => state.observe(ts, line_start as u64, policy),
        }
        line_start = line_end + 1;
    }

    debug!(target: "logsweep::index", path = %meta.full_path, skipped = state.skipped_lines, "Text scan complete");
    Ok(state.finish(&meta.content_etag))
}

fn build_gzip(
    meta: &FileMeta,
    policy: &IndexPolicy,
    extractor: &TimeExtractor,
) -> Result<FileIndex, IndexError> {
    let path = Path::new(&meta.full_path);
    let mut reader = GzipLineReader::open(path)?;

    let mut state = EmitState::new();
    if let Some(index) = &meta.file_index {
        if let Some(last) = index.time_indexes.last() {
            match reader.skip_to(last.offset) {
                Ok(()) => state = EmitState::resume(index),
                Err(IndexError::StartBeyondEof) => {
                    // Uncompressed stream shrank under the same inode:
                    // rebuild from the beginning.
                    reader = GzipLineReader::open(path)?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    while let Some(line) = reader.next_line()? {
        match extractor.extract(&line.text) {
            0 => state.skipped_lines += 1,
            ts => state.observe(ts, line.offset, policy),
        }
    }

    debug!(target: "logsweep::index", path = %meta.full_path, skipped = state.skipped_lines, "Gzip scan complete");
    Ok(state.finish(&meta.content_etag))
}
