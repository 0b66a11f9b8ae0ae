use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::agent::error::MatcherError;

use super::boolean::BooleanMatcher;

/// The three query flavors accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Simple,
    Boolean,
    Regex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub query: String,
    #[serde(rename = "type")]
    pub kind: QueryKind,
}

/// Shared contract of all matchers. A record passes a search when every
/// matcher in the request accepts its full multi-line text.
pub trait Matcher: Send + Sync {
    fn is_match(&self, line: &str) -> bool;
}

/// Literal substring matcher.
pub struct SimpleMatcher {
    pattern: String,
}

impl SimpleMatcher {
    pub fn build(pattern: &str) -> Result<Self, MatcherError> {
        if pattern.is_empty() {
            return Err(MatcherError::InvalidPattern(
                "Empty query string".to_string(),
            ));
        }
        Ok(Self {
            pattern: pattern.to_string(),
        })
    }
}

impl Matcher for SimpleMatcher {
    fn is_match(&self, line: &str) -> bool {
        line.contains(&self.pattern)
    }
}

/// Unanchored regular-expression matcher.
#[derive(Debug)]
pub struct RegexMatcher {
    regex: Regex,
}

impl RegexMatcher {
    pub fn build(pattern: &str) -> Result<Self, MatcherError> {
        if pattern.is_empty() {
            return Err(MatcherError::InvalidPattern(
                "Empty query string".to_string(),
            ));
        }
        let regex = Regex::new(pattern).map_err(|e| MatcherError::InvalidPattern(e.to_string()))?;
        Ok(Self { regex })
    }
}

impl Matcher for RegexMatcher {
    fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }
}

pub fn build_matcher(query: &Query) -> Result<Box<dyn Matcher>, MatcherError> {
    match query.kind {
        QueryKind::Simple => Ok(Box::new(SimpleMatcher::build(&query.query)?)),
        QueryKind::Boolean => Ok(Box::new(BooleanMatcher::build(&query.query)?)),
        QueryKind::Regex => Ok(Box::new(RegexMatcher::build(&query.query)?)),
    }
}

pub fn build_matchers(queries: &[Query]) -> Result<Vec<Box<dyn Matcher>>, MatcherError> {
    queries.iter().map(build_matcher).collect()
}
