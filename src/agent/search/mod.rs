pub mod boolean;
pub mod matcher;
pub mod searcher;

pub use matcher::{Query, QueryKind};
pub use searcher::{LogRecord, LogSearcher, SearchRequest, SearchResult};

#[cfg(test)]
mod matcher_test;
