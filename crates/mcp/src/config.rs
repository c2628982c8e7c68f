//! Helper process configuration.
//!
//! Servers are described in the common `mcpServers` JSON shape:
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "fields": { "command": "rule-fields-mcp", "args": ["--zone", "example.com"], "env": {} }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Configuration for an MCP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    /// Overlaid on the inherited environment.
    pub env: HashMap<String, String>,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServersFile {
    #[serde(default)]
    mcp_servers: BTreeMap<String, ServerEntry>,
}

#[derive(Debug, Deserialize)]
struct ServerEntry {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: HashMap<String, String>,
}

/// Load server configurations from a JSON file.
pub fn load_servers(path: impl AsRef<Path>) -> Result<Vec<ServerConfig>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
    parse_servers(&content)
}

/// Parse server configurations, ordered by server name.
pub fn parse_servers(json: &str) -> Result<Vec<ServerConfig>> {
    let file: ServersFile =
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;

    file.mcp_servers
        .into_iter()
        .map(|(name, entry)| {
            if entry.command.trim().is_empty() {
                return Err(Error::Config(format!("server {name}: empty command")));
            }
            Ok(ServerConfig {
                name,
                command: entry.command,
                args: entry.args,
                env: entry.env,
            })
        })
        .collect()
}
