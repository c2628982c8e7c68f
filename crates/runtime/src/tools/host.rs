//! Tool host trait.

use crate::model::{ToolCall, ToolSpec};
use crate::tools::ToolError;
use std::future::Future;

/// Trait for tool execution hosts.
///
/// Implementations provide tool specifications and execute tool calls.
/// This is the boundary between the model loop and side effects.
pub trait ToolHost: Send + Sync {
    /// Get available tool specifications. Empty means no tools are advertised.
    fn specs(&self) -> &[ToolSpec];

    /// Execute a tool call, returning the text handed back to the model.
    fn execute(&self, call: &ToolCall) -> impl Future<Output = Result<String, ToolError>> + Send;
}

impl<T: ToolHost> ToolHost for &T {
    fn specs(&self) -> &[ToolSpec] {
        (**self).specs()
    }

    fn execute(&self, call: &ToolCall) -> impl Future<Output = Result<String, ToolError>> + Send {
        (**self).execute(call)
    }
}
