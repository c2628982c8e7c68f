//! Tool registry spanning several MCP servers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use mcp::{McpClient, ServerConfig};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::model::{ToolCall, ToolSpec};
use crate::tools::{ToolError, ToolHost};
use crate::{Error, Result};

/// Presents the tools of every started MCP server as one namespace.
///
/// Servers that fail to start or list their tools are logged and skipped.
/// A registry without tools behaves exactly like [`EmptyToolHost`](crate::EmptyToolHost).
#[derive(Default)]
pub struct ToolRegistry {
    clients: Vec<Arc<McpClient>>,
    routes: HashMap<String, Arc<McpClient>>,
    specs: Vec<ToolSpec>,
}

impl ToolRegistry {
    /// Create a registry with no servers.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start every configured server and collect its tools.
    pub async fn connect(configs: Vec<ServerConfig>) -> Self {
        Self::connect_with_timeout(configs, Some(mcp::DEFAULT_TIMEOUT)).await
    }

    /// Like [`connect`](Self::connect) with an explicit per-request timeout.
    pub async fn connect_with_timeout(configs: Vec<ServerConfig>, timeout: Option<Duration>) -> Self {
        let mut registry = Self::empty();

        for config in configs {
            let name = config.name.clone();
            let client = McpClient::new(config).with_timeout(timeout);

            if let Err(e) = client.start().await {
                warn!(server = %name, error = %e, "skipping MCP server: failed to start");
                continue;
            }

            let tools = match client.list_tools().await {
                Ok(tools) => tools,
                Err(e) => {
                    warn!(server = %name, error = %e, "skipping MCP server: failed to list tools");
                    client.close().await;
                    continue;
                }
            };

            if tools.is_empty() {
                info!(server = %name, "MCP server offers no tools");
                client.close().await;
                continue;
            }

            registry.register(Arc::new(client), tools);
        }

        info!(
            servers = registry.clients.len(),
            tools = registry.specs.len(),
            "tool registry ready"
        );
        registry
    }

    fn register(&mut self, client: Arc<McpClient>, tools: Vec<mcp::Tool>) {
        for tool in tools {
            let spec = ToolSpec::from(tool);

            // Later servers win; keep the advertised catalog in step with routing.
            if let Some(previous) = self.routes.insert(spec.name.clone(), Arc::clone(&client)) {
                warn!(
                    tool = %spec.name,
                    previous = %previous.name(),
                    server = %client.name(),
                    "duplicate tool name, later server takes over"
                );
                self.specs.retain(|s| s.name != spec.name);
            }
            self.specs.push(spec);
        }
        self.clients.push(client);
    }

    /// Whether no tools are available.
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Name of the server that owns a tool.
    pub fn server_for(&self, tool: &str) -> Option<&str> {
        self.routes.get(tool).map(|client| client.name())
    }

    /// Names of the servers backing this registry.
    pub fn servers(&self) -> Vec<&str> {
        self.clients.iter().map(|client| client.name()).collect()
    }

    /// Route a call to the server that owns the tool.
    pub async fn call_tool(&self, name: &str, arguments: Option<Map<String, Value>>) -> Result<String> {
        let client = self
            .routes
            .get(name)
            .ok_or_else(|| Error::UnknownTool(name.to_string()))?;

        Ok(client.call_tool(name, arguments).await?)
    }

    /// Shut down every server. Safe to call more than once.
    pub async fn close(&self) {
        for client in &self.clients {
            client.close().await;
        }
    }
}

impl ToolHost for ToolRegistry {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn execute(&self, call: &ToolCall) -> std::result::Result<String, ToolError> {
        match self.call_tool(&call.name, tool_arguments(&call.input)).await {
            Ok(output) => Ok(output),
            Err(Error::UnknownTool(name)) => Err(ToolError::NotFound(name)),
            Err(Error::Mcp(mcp::Error::ToolCallFailed(message))) => Err(ToolError::Execution(message)),
            Err(e) => Err(ToolError::Execution(e.to_string())),
        }
    }
}

/// Arguments for `tools/call`. Anything other than a JSON object means no
/// arguments.
pub fn tool_arguments(input: &Value) -> Option<Map<String, Value>> {
    match input {
        Value::Object(map) => Some(map.clone()),
        Value::Null => None,
        other => {
            debug!(input = %other, "ignoring non-object tool input");
            None
        }
    }
}
