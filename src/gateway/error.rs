use std::io;
use thiserror::Error;

use crate::shared::http_client::ClientError;

/// Per-agent failures during scatter/gather. Each is logged and the
/// agent's contribution is elided; the aggregate request still succeeds.
#[derive(Debug, Error)]
pub enum FanoutError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Agent response JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Request failed: {0}")]
    Client(#[from] ClientError),

    #[error("Agent rejected request with status {0}")]
    BadStatus(u16),

    #[error("Agent reported failure: {0}")]
    AgentFailure(String),
}
