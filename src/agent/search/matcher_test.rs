use crate::agent::error::MatcherError;
use crate::agent::search::matcher::{
    build_matcher, build_matchers, Matcher, Query, QueryKind, RegexMatcher, SimpleMatcher,
};

#[test]
fn simple_matcher_is_substring() {
    let m = SimpleMatcher::build("timeout").unwrap();
    assert!(m.is_match("2025-01-01 00:00:00 connection timeout on fd 7"));
    assert!(!m.is_match("2025-01-01 00:00:00 connection reset"));
    // Case sensitive, byte-wise.
    assert!(!m.is_match("Connection Timeout"));
}

#[test]
fn regex_matcher_searches_unanchored() {
    let m = RegexMatcher::build(r"fd \d+").unwrap();
    assert!(m.is_match("closing fd 42 after error"));
    assert!(!m.is_match("closing socket after error"));
}

#[test]
fn invalid_regex_is_rejected_at_build() {
    let err = RegexMatcher::build(r"(unclosed").unwrap_err();
    assert!(matches!(err, MatcherError::InvalidPattern(_)));
}

#[test]
fn empty_patterns_are_rejected() {
    assert!(matches!(
        SimpleMatcher::build(""),
        Err(MatcherError::InvalidPattern(_))
    ));
    assert!(matches!(
        RegexMatcher::build(""),
        Err(MatcherError::InvalidPattern(_))
    ));
}

#[test]
fn build_matcher_dispatches_on_kind() {
    let simple = build_matcher(&Query {
        query: "error".to_string(),
        kind: QueryKind::Simple,
    })
    .unwrap();
    assert!(simple.is_match("an error line"));

    let boolean = build_matcher(&Query {
        query: "error AND disk".to_string(),
        kind: QueryKind::Boolean,
    })
    .unwrap();
    assert!(boolean.is_match("disk error on sda"));
    assert!(!boolean.is_match("plain error"));

    let regex = build_matcher(&Query {
        query: r"^\d{4}".to_string(),
        kind: QueryKind::Regex,
    })
    .unwrap();
    assert!(regex.is_match("2025 began"));
}

#[test]
fn build_matchers_fails_fast_on_any_bad_query() {
    let queries = vec![
        Query {
            query: "ok".to_string(),
            kind: QueryKind::Simple,
        },
        Query {
            query: "(broken".to_string(),
            kind: QueryKind::Regex,
        },
    ];
    assert!(build_matchers(&queries).is_err());
}

#[test]
fn query_kind_deserializes_from_wire_strings() {
    let q: Query = serde_json::from_str(r#"{"query":"x","type":"boolean"}"#).unwrap();
    assert_eq!(q.kind, QueryKind::Boolean);
    assert!(serde_json::from_str::<Query>(r#"{"query":"x","type":"fuzzy"}"#).is_err());
}
