//! Empty tool host implementation.

use crate::model::{ToolCall, ToolSpec};
use crate::tools::{ToolError, ToolHost};

/// A tool host with no tools, used when no helper servers are configured.
#[derive(Debug, Default)]
pub struct EmptyToolHost;

impl ToolHost for EmptyToolHost {
    fn specs(&self) -> &[ToolSpec] {
        &[]
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        Err(ToolError::NotFound(call.name.clone()))
    }
}
