pub mod agent;
pub mod gateway;
pub mod logging;
pub mod shared;
