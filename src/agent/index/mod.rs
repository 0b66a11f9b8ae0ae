pub mod builder;
pub mod cache;
pub mod gzip_stream;

#[cfg(test)]
mod builder_test;
