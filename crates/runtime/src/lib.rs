//! Exprgen runtime: LLM backends, MCP tools and the agentic loop.
//!
//! # Overview
//!
//! - **Backend**: a trait abstracting LLM providers. [`OpenAiBackend`] speaks
//!   chat completions with discrete tool-call messages, [`AnthropicBackend`]
//!   speaks messages with typed content blocks.
//! - **ToolHost**: where tool calls go. [`ToolRegistry`] merges the tools of
//!   several MCP servers; [`EmptyToolHost`] stands in when there are none.
//! - **Agent**: runs model turns and tool calls until a final answer or the
//!   iteration limit.
//! - **ExpressionGenerator**: builds rule-expression prompts and cleans the
//!   answer.
//!
//! # Example
//!
//! ```ignore
//! use runtime::{ExpressionGenerator, OpenAiBackend, ToolRegistry};
//!
//! # async fn example() -> runtime::Result<()> {
//! let servers = mcp::load_servers("mcp.json")?;
//! let registry = ToolRegistry::connect(servers).await;
//! let backend = OpenAiBackend::builder("sk-...", "gpt-4o").build();
//!
//! let generator = ExpressionGenerator::new(backend, &registry);
//! let expr = generator
//!     .generate_expression("ip.privacy.is_vpn (Boolean)", "block VPN traffic")
//!     .await;
//! registry.close().await;
//! println!("{}", expr?);
//! # Ok(())
//! # }
//! ```

mod agent;
mod clean;
mod error;
mod generator;
pub mod model;
pub mod providers;
pub mod tools;

pub use agent::{Agent, MAX_ITERATIONS, TOOL_USAGE_ADDENDUM};
pub use clean::clean_output;
pub use error::{Error, Result};
pub use generator::ExpressionGenerator;
pub use model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolCall, ToolResult,
    ToolSpec, Usage,
};
pub use providers::{AnthropicBackend, OpenAiBackend, Provider, ProviderKind};
pub use tools::{EmptyToolHost, ToolError, ToolHost, ToolRegistry};
