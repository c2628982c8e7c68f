//! Newline-delimited JSON-RPC over a child process's stdio.

use std::process::Stdio;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::debug;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::protocol::{JsonRpcRequest, JsonRpcResponse, RequestId};

/// Maximum size of a single line (1MB).
/// Sized for large tool outputs (file reads, search results).
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// Pipes to one running helper process.
///
/// Callers must hold exclusive access for a whole request/response cycle;
/// [`McpClient`](crate::McpClient) does this with its state lock.
pub struct Transport {
    server: String,
    process: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl Transport {
    /// Spawn the configured command with piped stdin/stdout.
    ///
    /// The child's stderr is forwarded line by line to `tracing` at debug level.
    pub fn spawn(config: &ServerConfig) -> Result<Self> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut process = cmd.spawn().map_err(Error::Spawn)?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdin")))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| Error::Spawn(std::io::Error::other("failed to capture stdout")))?;

        if let Some(stderr) = process.stderr.take() {
            let server = config.name.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(server = %server, "stderr: {line}");
                }
            });
        }

        Ok(Self {
            server: config.name.clone(),
            process,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
        })
    }

    /// Write one message followed by a newline.
    pub async fn send(&mut self, message: &JsonRpcRequest) -> Result<()> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');

        let stdin = self.stdin.as_mut().ok_or(Error::ServerExited)?;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;

        debug!(server = %self.server, method = %message.method, "sent");
        Ok(())
    }

    /// Read until the response for `expected` arrives.
    pub async fn receive(&mut self, expected: &RequestId) -> Result<JsonRpcResponse> {
        read_response(&mut self.stdout, expected).await
    }

    /// Close stdin, kill the process and reap it. Safe to call repeatedly.
    pub async fn close(&mut self) {
        if self.stdin.take().is_none() {
            return;
        }
        // Exit status is irrelevant here; the process may already be gone.
        let _ = self.process.kill().await;
        debug!(server = %self.server, "closed");
    }

    /// Whether [`close`](Self::close) has not been called yet.
    pub fn is_open(&self) -> bool {
        self.stdin.is_some()
    }

    /// Whether the child process is still running.
    pub fn is_running(&mut self) -> bool {
        matches!(self.process.try_wait(), Ok(None))
    }
}

/// Read newline-delimited messages until one answers `expected`.
///
/// Lines that are not JSON-RPC (helpers often log to stdout), notifications,
/// server-initiated requests and responses to other ids are discarded.
pub async fn read_response<R>(reader: &mut R, expected: &RequestId) -> Result<JsonRpcResponse>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();

    loop {
        line.clear();
        // Bounded so a helper that never sends a newline cannot exhaust memory.
        let limit = MAX_OUTPUT_SIZE as u64 + 1;
        let bytes_read = (&mut *reader).take(limit).read_until(b'\n', &mut line).await?;
        if bytes_read == 0 {
            return Err(Error::ServerExited);
        }

        if line.len() > MAX_OUTPUT_SIZE {
            return Err(Error::OutputTooLarge {
                size: line.len(),
                max: MAX_OUTPUT_SIZE,
            });
        }

        let trimmed = line.trim_ascii();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_slice::<JsonRpcResponse>(trimmed) {
            Ok(message) if message.answers(expected) => return Ok(message),
            Ok(message) => {
                debug!(id = ?message.id, method = ?message.method, "skipping unrelated message");
            }
            Err(_) => {
                debug!("skipping non JSON-RPC line");
            }
        }
    }
}
