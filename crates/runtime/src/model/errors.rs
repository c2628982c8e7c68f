use thiserror::Error;

/// Errors from LLM provider calls. None of these are retried.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The HTTP request could not be sent or its body not read.
    #[error("network: {0}")]
    Network(String),

    /// The provider answered with a non-2xx status.
    #[error("provider returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The provider reported an error in the response body.
    #[error("provider api: {0}")]
    Api(String),

    /// The provider response could not be parsed.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}
