//! MCP error types.

use crate::protocol::JsonRpcError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to spawn server: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("pipe error: {0}")]
    Io(#[from] std::io::Error),

    #[error("handshake failed: {0}")]
    Handshake(#[source] Box<Error>),

    #[error("invalid client state: {0}")]
    InvalidState(&'static str),

    #[error("server exited unexpectedly")]
    ServerExited,

    #[error("timeout after {0:?} waiting for response")]
    Timeout(Duration),

    #[error("failed to serialize request: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcError),

    #[error("tool call failed: {0}")]
    ToolCallFailed(String),

    #[error("output too large: {size} bytes (max {max})")]
    OutputTooLarge { size: usize, max: usize },

    #[error("invalid server config: {0}")]
    Config(String),
}

impl Error {
    /// Whether the tool ran and reported failure (as opposed to a transport
    /// or protocol problem).
    pub fn is_tool_failure(&self) -> bool {
        matches!(self, Error::ToolCallFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
