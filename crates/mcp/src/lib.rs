//! MCP (Model Context Protocol) client library.
//!
//! This crate provides a client for communicating with MCP servers via stdio.
//!
//! # Example
//!
//! ```no_run
//! use mcp::{McpClient, ServerConfig};
//!
//! # async fn example() -> mcp::Result<()> {
//! let config = ServerConfig::new("fields", "rule-fields-mcp").args(["--zone", "example.com"]);
//!
//! let client = McpClient::new(config);
//! client.start().await?;
//!
//! for tool in client.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let output = client.call_tool("list_fields", None).await?;
//! println!("{output}");
//!
//! client.close().await;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod protocol;
mod transport;

pub use client::{DEFAULT_TIMEOUT, McpClient};
pub use config::{ServerConfig, load_servers, parse_servers};
pub use error::{Error, Result};
pub use protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcError,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, PROTOCOL_VERSION, RequestId,
    ServerCapabilities, ServerInfo, Tool, ToolContent,
};
pub use transport::{MAX_OUTPUT_SIZE, Transport, read_response};
