use std::io::{Read, Write};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Response bodies shorter than this are never compressed.
pub const MIN_COMPRESS_LEN: usize = 1024;

/// Gzip-encode an HTTP body.
pub fn compress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::best());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Decode a gzip HTTP body (multi-member tolerant).
pub fn decompress(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = MultiGzDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 4);
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Compress `body` when the peer accepts gzip and the payload is large
/// enough to be worth it. Returns the bytes to send and the
/// `Content-Encoding` value to set, if any.
pub fn maybe_compress_body(body: Vec<u8>, accept_encoding: Option<&str>) -> (Vec<u8>, Option<&'static str>) {
    if body.len() < MIN_COMPRESS_LEN {
        return (body, None);
    }
    let accepts = accept_encoding.map(|v| v.contains("gzip")).unwrap_or(false);
    if !accepts {
        return (body, None);
    }
    match compress(&body) {
        Ok(compressed) => (compressed, Some("gzip")),
        Err(e) => {
            tracing::warn!(target: "logsweep::http", error = %e, "Body compression failed, sending identity");
            (body, None)
        }
    }
}
