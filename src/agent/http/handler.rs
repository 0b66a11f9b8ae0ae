use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{body::Incoming, header, Method, Request, Response, StatusCode};
use serde::Serialize;
use tracing::{info, warn};

use crate::agent::indexer::FileIndexer;
use crate::agent::search::searcher::{FileMatches, SearchResult};
use crate::agent::search::{LogRecord, LogSearcher, SearchRequest};
use crate::shared::gzip::maybe_compress_body;
use crate::shared::urlenc::parse_query;

#[derive(Serialize)]
struct ListEntry {
    path: String,
    size: u64,
    mtime: i64,
    etag: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_time: Option<i64>,
}

#[derive(Serialize)]
pub(crate) struct SearchRecord {
    pub(crate) path: String,
    pub(crate) status: i32,
    pub(crate) error_msg: String,
    pub(crate) start_time: i64,
    pub(crate) end_time: i64,
    pub(crate) lines: Vec<LogRecord>,
}

#[derive(Serialize)]
struct SearchResponse {
    status: i32,
    error_msg: String,
    records: Vec<SearchRecord>,
}

/// A required, non-empty query parameter.
pub(crate) fn required_param(params: &HashMap<String, String>, name: &str) -> Option<String> {
    params.get(name).filter(|v| !v.is_empty()).cloned()
}

pub(crate) fn required_prefix(params: &HashMap<String, String>) -> Option<String> {
    required_param(params, "prefix")
}

/// Request-level validation: at least one path and one query, and every
/// path covered by the prefix. Returns the 400 response text on violation.
pub(crate) fn validate_search_request(req: &SearchRequest, prefix: &str) -> Option<&'static str> {
    if req.paths.is_empty() || req.queries.is_empty() {
        return Some("Search request needs at least one path and one query");
    }
    if req.paths.iter().any(|p| !p.starts_with(prefix)) {
        return Some("Path is not under the prefix");
    }
    None
}

/// Request-level searcher failures are 500s; per-file failures are not.
pub(crate) fn search_status(result: &SearchResult) -> StatusCode {
    if result.status == 0 {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// Per-file outcomes that errored or matched nothing are elided from the
/// wire response; survivors carry their first/last line timestamps.
pub(crate) fn elide_file_matches(matches: Vec<FileMatches>) -> Vec<SearchRecord> {
    matches
        .into_iter()
        .filter(|fm| fm.status == 0 && !fm.lines.is_empty())
        .map(|fm| SearchRecord {
            start_time: fm.lines.first().map(|l| l.time).unwrap_or(0),
            end_time: fm.lines.last().map(|l| l.time).unwrap_or(0),
            path: fm.path,
            status: fm.status,
            error_msg: fm.error_msg,
            lines: fm.lines,
        })
        .collect()
}

pub async fn handle_request(
    req: Request<Incoming>,
    indexer: Arc<FileIndexer>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();
    match path.as_str() {
        "/hello" => Ok(text_response(StatusCode::OK, "Hello!!!")),
        "/log/list" => Ok(list(req, indexer).await),
        "/log/search" => Ok(search(req, indexer).await),
        _ => Ok(text_response(StatusCode::NOT_FOUND, "Not Found")),
    }
}

async fn list(req: Request<Incoming>, indexer: Arc<FileIndexer>) -> Response<Full<Bytes>> {
    if req.method() != Method::GET {
        warn!(target: "logsweep::http", uri = %req.uri(), "Only GET is allowed on /log/list");
        return text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    }
    let params = parse_query(req.uri().query());
    let Some(prefix) = required_prefix(&params) else {
        warn!(target: "logsweep::http", uri = %req.uri(), "prefix parameter is required");
        return text_response(StatusCode::BAD_REQUEST, "prefix parameter is required");
    };

    let results = indexer.list_prefix(&prefix);
    if results.is_empty() {
        warn!(target: "logsweep::http", prefix = %prefix, "No files found under prefix");
        return text_response(StatusCode::NOT_FOUND, "No files found under prefix");
    }

    let entries: Vec<ListEntry> = results
        .iter()
        .map(|meta| ListEntry {
            path: meta.full_path.clone(),
            size: meta.size,
            mtime: meta.mtime,
            etag: meta.content_etag.clone(),
            start_time: meta.file_index.as_ref().and_then(|i| i.first_timestamp()),
            end_time: meta.file_index.as_ref().and_then(|i| i.last_timestamp()),
        })
        .collect();

    info!(target: "logsweep::http", prefix = %prefix, files = entries.len(), "Listed files");
    json_response(StatusCode::OK, &entries)
}

async fn search(req: Request<Incoming>, indexer: Arc<FileIndexer>) -> Response<Full<Bytes>> {
    if req.method() != Method::POST {
        warn!(target: "logsweep::http", uri = %req.uri(), "Only POST is allowed on /log/search");
        return text_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed");
    }
    let params = parse_query(req.uri().query());
    let Some(prefix) = required_prefix(&params) else {
        return text_response(StatusCode::BAD_REQUEST, "prefix parameter is required");
    };
    if indexer.list_prefix(&prefix).is_empty() {
        warn!(target: "logsweep::http", prefix = %prefix, "No files found under prefix");
        return text_response(StatusCode::NOT_FOUND, "No files found under prefix");
    }

    let accept_encoding = req
        .headers()
        .get(header::ACCEPT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(target: "logsweep::http", error = %e, "Failed to read request body");
            return text_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to read body");
        }
    };
    let search_req: SearchRequest = match serde_json::from_slice(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(target: "logsweep::http", error = %e, "Invalid JSON in search body");
            return text_response(StatusCode::BAD_REQUEST, "Invalid JSON in request body");
        }
    };
    if let Some(msg) = validate_search_request(&search_req, &prefix) {
        warn!(target: "logsweep::http", prefix = %prefix, msg, "Search request rejected");
        return text_response(StatusCode::BAD_REQUEST, msg);
    }

    let table = Arc::clone(indexer.table());
    let extractor = Arc::clone(indexer.extractor());
    let result = match tokio::task::spawn_blocking(move || {
        LogSearcher::new(&table, &extractor).search(&search_req)
    })
    .await
    {
        Ok(result) => result,
        Err(e) => {
            warn!(target: "logsweep::http", error = %e, "Search task failed");
            return text_response(StatusCode::INTERNAL_SERVER_ERROR, "Search task failed");
        }
    };
    let status = search_status(&result);
    if status != StatusCode::OK {
        warn!(target: "logsweep::http", error = %result.error_msg, "Search failed");
        return text_response(status, &result.error_msg);
    }

    let records = elide_file_matches(result.matches);
    info!(target: "logsweep::http", prefix = %prefix, records = records.len(), "Search completed");
    let response = SearchResponse {
        status: 0,
        error_msg: String::new(),
        records,
    };
    json_response_compressed(StatusCode::OK, &response, accept_encoding.as_deref())
}

pub fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<Full<Bytes>> {
    match serde_json::to_vec(value) {
        Ok(body) => Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .unwrap(),
        Err(e) => {
            warn!(target: "logsweep::http", error = %e, "Response serialization failed");
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Serialization failed")
        }
    }
}

pub fn json_response_compressed<T: Serialize>(
    status: StatusCode,
    value: &T,
    accept_encoding: Option<&str>,
) -> Response<Full<Bytes>> {
    let body = match serde_json::to_vec(value) {
        Ok(body) => body,
        Err(e) => {
            warn!(target: "logsweep::http", error = %e, "Response serialization failed");
            return text_response(StatusCode::INTERNAL_SERVER_ERROR, "Serialization failed");
        }
    };
    let (body, encoding) = maybe_compress_body(body, accept_encoding);
    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(encoding) = encoding {
        builder = builder.header(header::CONTENT_ENCODING, encoding);
    }
    builder.body(Full::new(Bytes::from(body))).unwrap()
}
