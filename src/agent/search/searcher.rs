use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::agent::error::SearchError;
use crate::agent::index::gzip_stream::GzipLineReader;
use crate::agent::table::FileTable;
use crate::agent::types::{FileKind, IndexEntry};
use crate::shared::timefmt::TimeExtractor;

use super::matcher::{build_matchers, Matcher, Query};

/// Candidate records are matched in batches of this size to bound memory.
pub const MATCH_BATCH_SIZE: usize = 500;
pub const DEFAULT_MAX_RESULTS: usize = 500;

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub paths: Vec<String>,
    #[serde(rename = "queries", alias = "querys")]
    pub queries: Vec<Query>,
    pub start_time: i64,
    pub end_time: i64,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

/// One (possibly multi-line) log record and the timestamp of its first line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub line: String,
    pub time: i64,
}

/// Per-file outcome. A failed file reports `status = 1` with empty lines;
/// it never fails the aggregate request.
#[derive(Debug, Clone, Serialize)]
pub struct FileMatches {
    pub path: String,
    pub status: i32,
    pub error_msg: String,
    pub lines: Vec<LogRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub status: i32,
    pub error_msg: String,
    pub matches: Vec<FileMatches>,
}

impl SearchResult {
    fn failed(msg: &str) -> Self {
        Self {
            status: 1,
            error_msg: msg.to_string(),
            matches: Vec::new(),
        }
    }
}

/// Ranged search over indexed files.
pub struct LogSearcher<'a> {
    table: &'a FileTable,
    extractor: &'a TimeExtractor,
}

impl<'a> LogSearcher<'a> {
    pub fn new(table: &'a FileTable, extractor: &'a TimeExtractor) -> Self {
        Self { table, extractor }
    }

    pub fn search(&self, req: &SearchRequest) -> SearchResult {
        if req.queries.is_empty() {
            return SearchResult::failed("No queries specified");
        }
        if req.paths.is_empty() {
            return SearchResult::failed("No target paths specified");
        }
        let matchers = match build_matchers(&req.queries) {
            Ok(matchers) => matchers,
            Err(e) => {
                warn!(target: "logsweep::search", error = %e, "Failed to build search patterns");
                return SearchResult::failed(&format!("Failed to build search patterns: {e}"));
            }
        };

        let mut result = SearchResult {
            status: 0,
            error_msg: String::new(),
            matches: Vec::with_capacity(req.paths.len()),
        };
        for path in &req.paths {
            let outcome = self.search_one(path, &matchers, req);
            let file_matches = match outcome {
                Ok(lines) => FileMatches {
                    path: path.clone(),
                    status: 0,
                    error_msg: String::new(),
                    lines,
                },
                Err(e) => {
                    warn!(target: "logsweep::search", path = %path, error = %e, "Search failed for file");
                    FileMatches {
                        path: path.clone(),
                        status: 1,
                        error_msg: e.to_string(),
                        lines: Vec::new(),
                    }
                }
            };
            result.matches.push(file_matches);
        }
        result
    }

    fn search_one(
        &self,
        path: &str,
        matchers: &[Box<dyn Matcher>],
        req: &SearchRequest,
    ) -> Result<Vec<LogRecord>, SearchError> {
        let meta = self.table.get(path).ok_or(SearchError::NotIndexed)?;
        let index = meta.file_index.as_ref().ok_or(SearchError::NotIndexed)?;
        let (start_offset, end_offset) =
            bracket_offsets(&index.time_indexes, req.start_time, req.end_time)
                .ok_or(SearchError::NotCovered)?;

        debug!(
            target: "logsweep::search",
            path,
            start_offset,
            end_offset,
            "Offset window located"
        );

        let mut assembler = RecordAssembler::new(matchers, req);
        match meta.file_kind {
            FileKind::Text => {
                stream_text(path, start_offset, end_offset, self.extractor, &mut assembler)?
            }
            FileKind::Gzip => {
                stream_gzip(path, start_offset, end_offset, self.extractor, &mut assembler)?
            }
        }
        Ok(assembler.finish())
    }
}

/// Phase A: the smallest/largest consecutive-entry pair whose timestamp
/// span overlaps the request window brackets the byte range to stream.
pub fn bracket_offsets(entries: &[IndexEntry], start_time: i64, end_time: i64) -> Option<(u64, u64)> {
    let mut lo: Option<usize> = None;
    let mut hi: Option<usize> = None;
    for i in 0..entries.len().saturating_sub(1) {
        let pair_start = entries[i].timestamp;
        let pair_end = entries[i + 1].timestamp;
        if pair_start <= end_time && pair_end >= start_time {
            if lo.is_none() {
                lo = Some(i);
            }
            hi = Some(i + 1);
        }
    }
    Some((entries[lo?].offset, entries[hi?].offset))
}

/// Phase B state: reconstructs multi-line records inside the window and
/// evaluates matchers in batches.
struct RecordAssembler<'m> {
    matchers: &'m [Box<dyn Matcher>],
    start_time: i64,
    end_time: i64,
    max_results: usize,
    pending: Option<LogRecord>,
    candidates: Vec<LogRecord>,
    results: Vec<LogRecord>,
    done: bool,
}

impl<'m> RecordAssembler<'m> {
    fn new(matchers: &'m [Box<dyn Matcher>], req: &SearchRequest) -> Self {
        Self {
            matchers,
            start_time: req.start_time,
            end_time: req.end_time,
            max_results: req.max_results,
            pending: None,
            candidates: Vec::new(),
            results: Vec::new(),
            done: false,
        }
    }

    fn offer(&mut self, ts: i64, line: &str) {
        if ts != 0 {
            if ts < self.start_time {
                // Before the window: this line neither starts a record nor
                // continues one.
                self.pending = None;
                return;
            }
            if let Some(pending) = self.pending.take() {
                self.candidates.push(pending);
            }
            if ts > self.end_time {
                self.done = true;
            } else {
                self.pending = Some(LogRecord {
                    line: line.to_string(),
                    time: ts,
                });
            }
        } else if let Some(pending) = self.pending.as_mut() {
            pending.line.push('\n');
            pending.line.push_str(line);
        }

        if self.candidates.len() >= MATCH_BATCH_SIZE {
            self.evaluate_batch();
        }
        if self.results.len() >= self.max_results {
            self.done = true;
        }
    }

    fn evaluate_batch(&mut self) {
        for record in self.candidates.drain(..) {
            if self.results.len() >= self.max_results {
                break;
            }
            if self.matchers.iter().all(|m| m.is_match(&record.line)) {
                self.results.push(record);
            }
        }
    }

    fn finish(mut self) -> Vec<LogRecord> {
        if let Some(pending) = self.pending.take() {
            self.candidates.push(pending);
        }
        self.evaluate_batch();
        self.results.truncate(self.max_results);
        self.results
    }
}

fn stream_text(
    path: &str,
    start_offset: u64,
    end_offset: u64,
    extractor: &TimeExtractor,
    assembler: &mut RecordAssembler<'_>,
) -> Result<(), SearchError> {
    let file = File::open(path)?;
    let file_size = file.metadata()?.len();
    if start_offset >= file_size {
        return Err(SearchError::StartOutOfRange);
    }
    if end_offset >= file_size {
        return Err(SearchError::EndOutOfRange);
    }

    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(start_offset))?;
    let mut pos = start_offset;
    let mut buf: Vec<u8> = Vec::new();

    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            break;
        }
        pos += n as u64;
        let end = if buf.last() == Some(&b'\n') {
            buf.len() - 1
        } else {
            buf.len()
        };
        let line = String::from_utf8_lossy(&buf[..end]);
        assembler.offer(extractor.extract(&line), &line);
        if assembler.done || pos > end_offset {
            break;
        }
    }
    Ok(())
}

fn stream_gzip(
    path: &str,
    start_offset: u64,
    end_offset: u64,
    extractor: &TimeExtractor,
    assembler: &mut RecordAssembler<'_>,
) -> Result<(), SearchError> {
    let mut reader = GzipLineReader::open(Path::new(path))?;
    reader.skip_to(start_offset)?;

    while let Some(line) = reader.next_line()? {
        assembler.offer(extractor.extract(&line.text), &line.text);
        if assembler.done || line.offset + line.raw_len > end_offset {
            break;
        }
    }
    Ok(())
}
