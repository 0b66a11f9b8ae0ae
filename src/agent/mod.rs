pub mod announce;
pub mod error;
pub mod http;
pub mod index;
pub mod indexer;
pub mod scanner;
pub mod search;
pub mod table;
pub mod types;

pub use indexer::FileIndexer;
pub use table::FileTable;

#[cfg(test)]
mod scanner_test;
#[cfg(test)]
mod table_test;
