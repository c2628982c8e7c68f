//! MCP client lifecycle: spawn, handshake, tool requests, shutdown.

use std::future::Future;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, JsonRpcRequest,
    ListToolsResult, RequestId, Tool,
};
use crate::transport::Transport;

/// Default timeout for MCP requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

enum State {
    Unstarted,
    Ready(Transport),
    Closed,
}

/// Client for one MCP helper process.
///
/// `Unstarted → Ready → Closed`. A client whose start fails is closed for
/// good; build a new one to retry.
pub struct McpClient {
    config: ServerConfig,
    state: Mutex<State>,
    next_id: AtomicI64,
    timeout: Option<Duration>,
}

impl McpClient {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::Unstarted),
            next_id: AtomicI64::new(1),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Set the per-request timeout. `None` waits indefinitely.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Spawn the process and perform the `initialize` handshake.
    pub async fn start(&self) -> Result<InitializeResult> {
        let mut state = self.state.lock().await;
        match &*state {
            State::Unstarted => {}
            State::Ready(_) => return Err(Error::InvalidState("already started")),
            State::Closed => return Err(Error::InvalidState("closed")),
        }

        let mut transport = match Transport::spawn(&self.config) {
            Ok(transport) => transport,
            Err(e) => {
                *state = State::Closed;
                return Err(e);
            }
        };

        match self.handshake(&mut transport).await {
            Ok(result) => {
                info!(
                    server = %self.config.name,
                    peer = %result.server_info.name,
                    protocol = %result.protocol_version,
                    "MCP server ready"
                );
                *state = State::Ready(transport);
                Ok(result)
            }
            Err(e) => {
                transport.close().await;
                *state = State::Closed;
                Err(Error::Handshake(Box::new(e)))
            }
        }
    }

    async fn handshake(&self, transport: &mut Transport) -> Result<InitializeResult> {
        let result = self
            .round_trip(transport, "initialize", Some(InitializeParams::default()))
            .await?;
        transport
            .send(&JsonRpcRequest::notification("notifications/initialized"))
            .await?;
        Ok(result)
    }

    /// Fetch the server's tool catalog.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let result: ListToolsResult = self.request("tools/list", None::<()>).await?;
        debug!(server = %self.config.name, count = result.tools.len(), "listed tools");
        Ok(result.tools)
    }

    /// Call a tool and return its text output (text parts joined by newlines).
    ///
    /// A result flagged `isError` becomes [`Error::ToolCallFailed`] carrying
    /// the tool's text.
    pub async fn call_tool(&self, name: &str, arguments: Option<Map<String, Value>>) -> Result<String> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result: CallToolResult = self.request("tools/call", Some(params)).await?;

        if result.is_error {
            return Err(Error::ToolCallFailed(result.text()));
        }

        Ok(result.text())
    }

    /// Terminate the server process. Idempotent.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        if let State::Ready(transport) = &mut *state {
            transport.close().await;
        }
        *state = State::Closed;
    }

    /// Whether the handshake completed and the client has not been closed.
    pub async fn is_ready(&self) -> bool {
        matches!(&*self.state.lock().await, State::Ready(_))
    }

    /// Whether the client reached its terminal state.
    pub async fn is_closed(&self) -> bool {
        matches!(&*self.state.lock().await, State::Closed)
    }

    /// Whether the server process is still running.
    pub async fn is_running(&self) -> bool {
        match &mut *self.state.lock().await {
            State::Ready(transport) => transport.is_running(),
            _ => false,
        }
    }

    // --- Internal methods ---

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let mut state = self.state.lock().await;
        let transport = match &mut *state {
            State::Ready(transport) => transport,
            State::Unstarted => return Err(Error::InvalidState("not started")),
            State::Closed => return Err(Error::InvalidState("closed")),
        };
        let result = self.round_trip(transport, method, params).await;
        if !transport.is_open() {
            *state = State::Closed;
        }
        result
    }

    /// Write a request and wait for its response, each step bounded by the
    /// timeout.
    ///
    /// A write that times out may leave a partial line on the helper's stdin,
    /// so the transport is closed rather than reused.
    async fn round_trip<P, R>(
        &self,
        transport: &mut Transport,
        method: &str,
        params: Option<P>,
    ) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p)?;
        }

        let sent = self.bounded(transport.send(&request)).await;
        if let Err(e) = sent {
            if matches!(e, Error::Timeout(_)) {
                warn!(server = %self.config.name, method, "write timed out, closing server");
                transport.close().await;
            }
            return Err(e);
        }

        let response = self.bounded(transport.receive(&id)).await?;

        let value = response.into_result()?;
        serde_json::from_value(value)
            .map_err(|e| Error::InvalidResponse(format!("{method}: {e}")))
    }

    async fn bounded<T>(&self, step: impl Future<Output = Result<T>>) -> Result<T> {
        match self.timeout {
            Some(limit) => timeout(limit, step).await.map_err(|_| Error::Timeout(limit))?,
            None => step.await,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const INIT_REPLY: &str = r#"{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"fake","version":"0.0.1"}}}"#;

    /// A helper that answers `initialize`, swallows the notification, then
    /// prints each of `replies` after reading one request line.
    fn scripted(name: &str, replies: &[&str]) -> ServerConfig {
        let mut script = format!("read -r l; echo '{INIT_REPLY}'; read -r l; ");
        for reply in replies {
            script.push_str(&format!("read -r l; echo '{reply}'; "));
        }
        script.push_str("read -r l");
        ServerConfig::new(name, "sh").args(["-c", script.as_str()])
    }

    #[tokio::test]
    async fn handshake_list_and_call() {
        let config = scripted(
            "fields",
            &[
                r#"{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"list_fields","description":"List fields","inputSchema":{"type":"object"}}]}}"#,
                concat!(
                    "log line from the helper\n",
                    r#"{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"ip.src"},{"type":"text","text":"http.host"}]}}"#,
                ),
            ],
        );
        let client = McpClient::new(config);
        assert!(!client.is_ready().await);

        let info = client.start().await.unwrap();
        assert_eq!(info.server_info.name, "fake");
        assert!(client.is_ready().await);

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "list_fields");

        let output = client.call_tool("list_fields", None).await.unwrap();
        assert_eq!(output, "ip.src\nhttp.host");

        client.close().await;
        assert!(client.is_closed().await);
        client.close().await;
    }

    #[tokio::test]
    async fn tool_error_flag_becomes_tool_call_failed() {
        let config = scripted(
            "fields",
            &[r#"{"jsonrpc":"2.0","id":2,"result":{"content":[{"type":"text","text":"unknown zone"}],"isError":true}}"#],
        );
        let client = McpClient::new(config);
        client.start().await.unwrap();

        let err = client.call_tool("list_fields", None).await.unwrap_err();
        assert!(err.is_tool_failure());
        assert_eq!(err.to_string(), "tool call failed: unknown zone");
        client.close().await;
    }

    #[tokio::test]
    async fn failed_handshake_closes_client() {
        let config = ServerConfig::new("broken", "sh").args(["-c", "read -r l; exit 1"]);
        let client = McpClient::new(config);

        let err = client.start().await.unwrap_err();
        assert!(matches!(err, Error::Handshake(_)));
        assert!(client.is_closed().await);

        // Never usable again.
        assert!(matches!(client.start().await, Err(Error::InvalidState(_))));
        assert!(matches!(client.list_tools().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn missing_executable_is_spawn_error() {
        let client = McpClient::new(ServerConfig::new("ghost", "/nonexistent/mcp-helper"));
        assert!(matches!(client.start().await, Err(Error::Spawn(_))));
        assert!(client.is_closed().await);
    }

    fn process_alive(pid: &str) -> bool {
        std::process::Command::new("kill")
            .args(["-0", pid])
            .stderr(std::process::Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn silent_server_times_out_and_is_killed() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("helper.pid");
        let script = format!("echo $$ > '{}'; exec sleep 30", pidfile.display());
        let config = ServerConfig::new("mute", "sh").args(["-c", script.as_str()]);
        let client = McpClient::new(config).with_timeout(Some(Duration::from_millis(300)));

        let err = client.start().await.unwrap_err();
        match err {
            Error::Handshake(inner) => assert!(matches!(*inner, Error::Timeout(_))),
            other => panic!("expected handshake timeout, got {other:?}"),
        }
        assert!(client.is_closed().await);

        let pid = std::fs::read_to_string(&pidfile).unwrap();
        assert!(!process_alive(pid.trim()), "helper {} still running", pid.trim());
    }

    #[tokio::test]
    async fn stalled_write_closes_client() {
        // Answers the handshake, then stops reading stdin.
        let script = format!("read -r l; echo '{INIT_REPLY}'; exec sleep 30");
        let config = ServerConfig::new("stuck", "sh").args(["-c", script.as_str()]);
        let client = McpClient::new(config).with_timeout(Some(Duration::from_millis(300)));
        client.start().await.unwrap();

        // Far larger than a pipe buffer, so the write cannot complete.
        let mut arguments = Map::new();
        arguments.insert("blob".into(), Value::String("x".repeat(4 * 1024 * 1024)));

        let err = client.call_tool("upload", Some(arguments)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(client.is_closed().await);
        assert!(matches!(
            client.call_tool("upload", None).await,
            Err(Error::InvalidState("closed"))
        ));
    }

    #[tokio::test]
    async fn requests_before_start_are_rejected() {
        let client = McpClient::new(ServerConfig::new("idle", "true"));
        assert!(matches!(
            client.call_tool("x", None).await,
            Err(Error::InvalidState("not started"))
        ));
    }

    #[tokio::test]
    async fn env_overlay_reaches_child() {
        let script = format!(
            "read -r l; echo '{INIT_REPLY}'; read -r l; read -r l; \
             printf '{{\"jsonrpc\":\"2.0\",\"id\":2,\"result\":{{\"tools\":[{{\"name\":\"%s\"}}]}}}}\\n' \"$TOOL_NAME\"; \
             read -r l"
        );
        let config = ServerConfig::new("env", "sh")
            .args(["-c", script.as_str()])
            .env("TOOL_NAME", "from_env");
        let client = McpClient::new(config);
        client.start().await.unwrap();

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools[0].name, "from_env");
        client.close().await;
    }
}
