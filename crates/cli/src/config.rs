//! Configuration loading from exprgen.toml.

use runtime::{AnthropicBackend, OpenAiBackend, Provider, ProviderKind};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the working directory when `--config` is absent.
pub const CONFIG_FILE: &str = "exprgen.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// LLM provider configuration.
    #[serde(default)]
    pub backend: BackendConfig,

    /// MCP helper servers.
    #[serde(default)]
    pub mcp: McpConfig,
}

/// LLM provider configuration.
#[derive(Debug, Deserialize)]
pub struct BackendConfig {
    /// "openai" or "anthropic".
    #[serde(default)]
    pub provider: ProviderKind,

    /// Model to use; defaults per provider.
    pub model: Option<String>,

    /// API key. Falls back to OPENAI_API_KEY / ANTHROPIC_API_KEY.
    pub api_key: Option<String>,

    /// Override the vendor API root (proxies, compatible gateways).
    pub base_url: Option<String>,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: None,
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> u32 {
    1024
}

/// MCP helper server configuration.
#[derive(Debug, Deserialize)]
pub struct McpConfig {
    /// JSON file in the `mcpServers` format.
    pub servers: Option<PathBuf>,

    /// Per-request timeout in seconds; 0 disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            servers: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    mcp::DEFAULT_TIMEOUT.as_secs()
}

impl McpConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load an explicit file, else `exprgen.toml` if present, else defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::load(path),
            None if Path::new(CONFIG_FILE).exists() => Self::load(CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    pub fn model(&self) -> String {
        self.backend
            .model
            .clone()
            .unwrap_or_else(|| self.backend.provider.default_model().to_string())
    }

    /// The configured key, else the provider's environment variable.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        self.api_key_from(|name| std::env::var(name).ok())
    }

    fn api_key_from(&self, env: impl Fn(&str) -> Option<String>) -> Result<String, ConfigError> {
        let provider = self.backend.provider;
        let var = provider.api_key_env();
        self.backend
            .api_key
            .clone()
            .or_else(|| env(var))
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey { provider, var })
    }

    /// Build the configured backend.
    pub fn provider(&self) -> Result<Provider, ConfigError> {
        let api_key = self.api_key()?;
        let model = self.model();
        let base_url = self.backend.base_url.as_deref();

        let provider = match self.backend.provider {
            ProviderKind::OpenAi => {
                let mut builder =
                    OpenAiBackend::builder(api_key, model).max_tokens(self.backend.max_tokens);
                if let Some(url) = base_url {
                    builder = builder.base_url(url);
                }
                Provider::from(builder.build())
            }
            ProviderKind::Anthropic => {
                let mut builder =
                    AnthropicBackend::builder(api_key, model).max_tokens(self.backend.max_tokens);
                if let Some(url) = base_url {
                    builder = builder.base_url(url);
                }
                Provider::from(builder.build())
            }
        };
        Ok(provider)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("{provider} API key not configured: set backend.api_key or {var}")]
    MissingApiKey {
        provider: ProviderKind,
        var: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_empty() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.backend.provider, ProviderKind::OpenAi);
        assert_eq!(config.model(), "gpt-4o");
        assert_eq!(config.backend.max_tokens, 1024);
        assert!(config.mcp.servers.is_none());
        assert_eq!(config.mcp.timeout(), Some(mcp::DEFAULT_TIMEOUT));
    }

    #[test]
    fn parse_full_config() {
        let config = Config::parse(
            r#"
            [backend]
            provider = "anthropic"
            model = "claude-opus-4"
            api_key = "sk-ant-file"
            base_url = "http://localhost:8080/v1"
            max_tokens = 2048

            [mcp]
            servers = "mcp.json"
            timeout_secs = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.backend.provider, ProviderKind::Anthropic);
        assert_eq!(config.model(), "claude-opus-4");
        assert_eq!(config.backend.max_tokens, 2048);
        assert_eq!(config.mcp.servers.as_deref(), Some(Path::new("mcp.json")));
        assert_eq!(config.mcp.timeout(), None);
        assert_eq!(config.api_key().unwrap(), "sk-ant-file");
        assert_eq!(config.provider().unwrap().to_string(), "anthropic(claude-opus-4)");
    }

    #[test]
    fn unknown_provider_rejected() {
        let err = Config::parse("[backend]\nprovider = \"gemini\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn api_key_falls_back_to_env() {
        let config = Config::parse("[backend]\nprovider = \"anthropic\"").unwrap();
        let key = config
            .api_key_from(|name| (name == "ANTHROPIC_API_KEY").then(|| "sk-ant-env".to_string()))
            .unwrap();
        assert_eq!(key, "sk-ant-env");
    }

    #[test]
    fn missing_api_key_names_env_var() {
        let config = Config::default();
        let err = config.api_key_from(|_| None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "openai API key not configured: set backend.api_key or OPENAI_API_KEY"
        );
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[backend]\nmodel = \"gpt-4o-mini\"").unwrap();
        let config = Config::discover(Some(file.path())).unwrap();
        assert_eq!(config.model(), "gpt-4o-mini");
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let err = Config::discover(Some(Path::new("/nonexistent/exprgen.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
