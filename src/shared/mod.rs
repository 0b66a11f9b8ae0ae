pub mod config;
pub mod gzip;
pub mod hash;
pub mod http_client;
pub mod timefmt;
pub mod urlenc;
