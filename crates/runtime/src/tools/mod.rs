//! Tool execution and MCP integration.

mod empty;
pub mod errors;
mod host;
mod registry;

pub use empty::EmptyToolHost;
pub use errors::ToolError;
pub use host::ToolHost;
pub use registry::{ToolRegistry, tool_arguments};
