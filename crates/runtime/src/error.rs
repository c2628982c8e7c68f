use crate::model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("no final answer after {max} iterations")]
    IterationLimit { max: usize },

    #[error(transparent)]
    Mcp(#[from] mcp::Error),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, Error>;
