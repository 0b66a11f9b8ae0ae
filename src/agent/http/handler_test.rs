use std::collections::HashMap;

use hyper::StatusCode;

use crate::agent::http::handler::{
    elide_file_matches, required_param, required_prefix, search_status, validate_search_request,
};
use crate::agent::search::matcher::{Query, QueryKind};
use crate::agent::search::searcher::{FileMatches, SearchResult};
use crate::agent::search::{LogRecord, SearchRequest};

fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn simple(query: &str) -> Query {
    Query {
        query: query.to_string(),
        kind: QueryKind::Simple,
    }
}

fn request(paths: &[&str]) -> SearchRequest {
    SearchRequest {
        paths: paths.iter().map(|p| p.to_string()).collect(),
        queries: vec![simple("x")],
        start_time: 0,
        end_time: 10,
        max_results: 500,
    }
}

fn file_matches(path: &str, status: i32, lines: &[(i64, &str)]) -> FileMatches {
    FileMatches {
        path: path.to_string(),
        status,
        error_msg: if status == 0 { String::new() } else { "boom".to_string() },
        lines: lines
            .iter()
            .map(|(time, line)| LogRecord {
                line: line.to_string(),
                time: *time,
            })
            .collect(),
    }
}

#[test]
fn required_prefix_rejects_missing_and_empty() {
    assert!(required_prefix(&params(&[])).is_none());
    assert!(required_prefix(&params(&[("prefix", "")])).is_none());
    assert_eq!(
        required_prefix(&params(&[("prefix", "/var/log")])).as_deref(),
        Some("/var/log")
    );
    assert_eq!(
        required_param(&params(&[("agent_addr", "10.0.0.1:8113")]), "agent_addr").as_deref(),
        Some("10.0.0.1:8113")
    );
}

#[test]
fn search_validation_needs_paths_and_queries() {
    let mut req = request(&["/var/log/a.log"]);
    assert!(validate_search_request(&req, "/var/log").is_none());

    req.queries.clear();
    assert_eq!(
        validate_search_request(&req, "/var/log"),
        Some("Search request needs at least one path and one query")
    );

    let empty_paths = SearchRequest {
        paths: Vec::new(),
        ..request(&[])
    };
    assert!(validate_search_request(&empty_paths, "/var/log").is_some());
}

#[test]
fn search_validation_rejects_paths_outside_prefix() {
    let req = request(&["/var/log/a.log", "/etc/passwd"]);
    assert_eq!(
        validate_search_request(&req, "/var/log"),
        Some("Path is not under the prefix")
    );

    let covered = request(&["/var/log/a.log", "/var/log/nginx/b.log"]);
    assert!(validate_search_request(&covered, "/var/log").is_none());
}

#[test]
fn request_level_failures_map_to_500() {
    let ok = SearchResult {
        status: 0,
        error_msg: String::new(),
        matches: Vec::new(),
    };
    assert_eq!(search_status(&ok), StatusCode::OK);

    let failed = SearchResult {
        status: 1,
        error_msg: "No queries specified".to_string(),
        matches: Vec::new(),
    };
    assert_eq!(search_status(&failed), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn elision_drops_errored_and_empty_files() {
    let records = elide_file_matches(vec![
        file_matches("/var/log/err.log", 1, &[]),
        file_matches("/var/log/empty.log", 0, &[]),
        file_matches(
            "/var/log/hit.log",
            0,
            &[(100, "first"), (150, "middle"), (200, "last")],
        ),
    ]);

    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.path, "/var/log/hit.log");
    assert_eq!(record.status, 0);
    assert_eq!(record.start_time, 100);
    assert_eq!(record.end_time, 200);
    assert_eq!(record.lines.len(), 3);
}

#[test]
fn search_request_accepts_legacy_querys_key() {
    let modern: SearchRequest = serde_json::from_value(serde_json::json!({
        "paths": ["/var/log/a.log"],
        "queries": [{"query": "x", "type": "simple"}],
        "start_time": 1,
        "end_time": 2
    }))
    .unwrap();
    assert_eq!(modern.max_results, 500);

    let legacy: SearchRequest = serde_json::from_value(serde_json::json!({
        "paths": ["/var/log/a.log"],
        "querys": [{"query": "x", "type": "regex"}],
        "start_time": 1,
        "end_time": 2,
        "max_results": 9
    }))
    .unwrap();
    assert_eq!(legacy.queries.len(), 1);
    assert_eq!(legacy.max_results, 9);
}

#[test]
fn search_request_rejects_malformed_bodies() {
    // Missing window bounds or a wrong type fails parsing, which the
    // handler maps to 400.
    assert!(serde_json::from_value::<SearchRequest>(serde_json::json!({
        "paths": ["/a"],
        "queries": [{"query": "x", "type": "simple"}]
    }))
    .is_err());
    assert!(serde_json::from_value::<SearchRequest>(serde_json::json!({
        "paths": ["/a"],
        "queries": [{"query": "x", "type": "simple"}],
        "start_time": "yesterday",
        "end_time": 2
    }))
    .is_err());
}
