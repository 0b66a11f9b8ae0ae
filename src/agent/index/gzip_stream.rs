use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::agent::error::IndexError;

/// Decompressed output is consumed in chunks of this size.
pub const CHUNK_SIZE: usize = 16 * 1024;

/// A carry buffer (one partial line spanning chunk boundaries) larger than
/// this aborts the operation for the file.
pub const MAX_CARRY_BYTES: usize = 100 * 1024 * 1024;

/// Streams lines out of a gzip file while tracking each line's starting
/// offset in the *uncompressed* byte stream.
///
/// Decoding runs in fixed-size output chunks; a partial line at a chunk
/// boundary is carried into the next chunk. Concatenated gzip members are
/// decoded as one logical stream (the decoder restarts on the member magic).
pub struct GzipLineReader {
    decoder: MultiGzDecoder<BufReader<File>>,
    carry: Vec<u8>,
    /// Uncompressed offset of `carry[0]`.
    base: u64,
    /// Scan cursor into `carry`; bytes before it are consumed lines.
    pos: usize,
    eof: bool,
}

pub struct GzipLine {
    /// Uncompressed offset of the first byte of the line.
    pub offset: u64,
    pub text: String,
    /// Length of the line on disk including its newline.
    pub raw_len: u64,
}

impl GzipLineReader {
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        let file = File::open(path)?;
        Ok(Self {
            decoder: MultiGzDecoder::new(BufReader::new(file)),
            carry: Vec::new(),
            base: 0,
            pos: 0,
            eof: false,
        })
    }

    /// Decompress and discard until exactly `target` uncompressed bytes have
    /// been emitted. Errors if the stream ends first. Must be called before
    /// the first `next_line`.
    pub fn skip_to(&mut self, target: u64) -> Result<(), IndexError> {
        debug_assert!(self.carry.is_empty() && self.base == 0);
        let mut buf = [0u8; CHUNK_SIZE];
        let mut consumed: u64 = 0;
        while consumed < target {
            let want = (target - consumed).min(CHUNK_SIZE as u64) as usize;
            let n = self
                .decoder
                .read(&mut buf[..want])
                .map_err(|e| IndexError::Decompress(e.to_string()))?;
            if n == 0 {
                return Err(IndexError::StartBeyondEof);
            }
            consumed += n as u64;
        }
        self.base = target;
        Ok(())
    }

    /// Next complete line, or `None` at end of stream. A trailing fragment
    /// with no newline is not a line.
    pub fn next_line(&mut self) -> Result<Option<GzipLine>, IndexError> {
        loop {
            if let Some(nl) = self.carry[self.pos..].iter().position(|&b| b == b'\n') {
                let start = self.pos;
                let end = start + nl;
                let line = GzipLine {
                    offset: self.base + start as u64,
                    text: String::from_utf8_lossy(&self.carry[start..end]).into_owned(),
                    raw_len: (nl + 1) as u64,
                };
                self.pos = end + 1;
                return Ok(Some(line));
            }
            if self.eof {
                return Ok(None);
            }

            // Compact the consumed prefix before pulling the next chunk.
            if self.pos > 0 {
                self.carry.drain(..self.pos);
                self.base += self.pos as u64;
                self.pos = 0;
            }
            if self.carry.len() > MAX_CARRY_BYTES {
                return Err(IndexError::CarryTooLarge(MAX_CARRY_BYTES));
            }

            let old_len = self.carry.len();
            self.carry.resize(old_len + CHUNK_SIZE, 0);
            let n = self
                .decoder
                .read(&mut self.carry[old_len..])
                .map_err(|e| IndexError::Decompress(e.to_string()))?;
            self.carry.truncate(old_len + n);
            if n == 0 {
                self.eof = true;
            }
        }
    }

    /// Uncompressed offset one past the last consumed line.
    pub fn position(&self) -> u64 {
        self.base + self.pos as u64
    }
}
