use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, atomic::AtomicU64};
use std::time::Duration;
use tokio::task;
use tracing::debug;

use crate::tool::ToolDescriptor;

/// Configuration for connecting to an MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MCPConfig {
    /// Name of the MCP server
    pub name: String,
    /// Transport type and configuration
    pub transport: MCPTransport,
    /// Connection timeout
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Transport type for MCP connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MCPTransport {
    /// Connect via stdin/stdout of a spawned process
    Stdio {
        /// The command to run
        command: String,
        /// Command arguments
        args: Vec<String>,
        /// Environment variables
        #[serde(skip_serializing_if = "Option::is_none")]
        env: Option<HashMap<String, String>>,
    },
    /// Connect via HTTP JSON-RPC
    Http {
        /// The URL of the MCP server
        url: String,
    },
}

/// Errors from MCP operations.
#[derive(Debug, thiserror::Error)]
pub enum MCPError {
    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),
    /// Protocol error
    #[error("Protocol error: {0}")]
    ProtocolError(String),
    /// Execution error
    #[error("Execution error: {0}")]
    ExecutionError(String),
    /// HTTP error
    #[error("HTTP error: {0}")]
    HttpError(String),
}

/// Builder for MCP client.
#[derive(Debug, Default)]
pub struct MCPClientBuilder {
    name: Option<String>,
    transport: Option<MCPTransport>,
    timeout: Option<Duration>,
}

impl MCPClientBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the server name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Configures stdio transport.
    pub fn with_stdio_transport(mut self, command: impl Into<String>, args: Vec<String>) -> Self {
        self.transport = Some(MCPTransport::Stdio {
            command: command.into(),
            args,
            env: None,
        });
        self
    }

    /// Configures HTTP transport.
    pub fn with_http_transport(mut self, url: impl Into<String>) -> Self {
        self.transport = Some(MCPTransport::Http { url: url.into() });
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the MCP client.
    pub fn build(self) -> Result<MCPClient, MCPError> {
        let name = self
            .name
            .ok_or_else(|| MCPError::ConnectionError("MCP server name is required".to_string()))?;
        let transport = self
            .transport
            .ok_or_else(|| MCPError::ConnectionError("MCP transport is required".to_string()))?;
        let timeout = self.timeout.unwrap_or_else(default_timeout);

        Ok(MCPClient {
            config: MCPConfig {
                name,
                transport,
                timeout,
            },
            process: None,
            stdin: None,
            stdout_reader: None,
            http_client: None,
            message_id: AtomicU64::new(0),
        })
    }
}

/// A client for connecting to MCP tool servers.
///
/// Speaks line-delimited JSON-RPC over a child process's stdio, or JSON-RPC
/// over HTTP POST.
#[derive(Debug)]
pub struct MCPClient {
    config: MCPConfig,
    // Stdio transport fields
    process: Option<Child>,
    stdin: Option<std::process::ChildStdin>,
    stdout_reader: Option<Arc<Mutex<BufReader<std::process::ChildStdout>>>>,
    // HTTP transport fields
    http_client: Option<reqwest::Client>,
    // Message ID counter for JSON-RPC
    message_id: AtomicU64,
}

impl MCPClient {
    /// Creates a new builder.
    pub fn builder() -> MCPClientBuilder {
        MCPClientBuilder::new()
    }

    /// Returns the configured server name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Connects to the MCP server and performs the initialize handshake.
    pub async fn connect(&mut self) -> Result<(), MCPError> {
        let transport = self.config.transport.clone();

        match transport {
            MCPTransport::Stdio { command, args, env } => {
                self.connect_stdio(&command, &args, &env).await
            }
            MCPTransport::Http { url } => self.connect_http(&url).await,
        }
    }

    /// Connects via stdio.
    async fn connect_stdio(
        &mut self,
        command: &str,
        args: &[String],
        env: &Option<HashMap<String, String>>,
    ) -> Result<(), MCPError> {
        debug!("Starting MCP server: {} {:?}", command, args);

        let mut cmd = Command::new(command);
        cmd.args(args);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());

        if let Some(env_vars) = env {
            for (key, value) in env_vars {
                cmd.env(key, value);
            }
        }

        let mut process = cmd
            .spawn()
            .map_err(|e| MCPError::ConnectionError(format!("Failed to start MCP server: {}", e)))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| MCPError::ConnectionError("Failed to get stdin".to_string()))?;

        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| MCPError::ConnectionError("Failed to get stdout".to_string()))?;

        self.process = Some(process);
        self.stdin = Some(stdin);
        self.stdout_reader = Some(Arc::new(Mutex::new(BufReader::new(stdout))));

        // Send initialize message and read response
        let message = self.create_initialize_request();
        self.send_message_stdio(message)?;
        let _init_response = self.read_json_response().await?;

        debug!("MCP server initialized successfully");

        Ok(())
    }

    /// Connects via HTTP.
    async fn connect_http(&mut self, url: &str) -> Result<(), MCPError> {
        debug!("Connecting to MCP server via HTTP: {}", url);

        let client = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .build()
            .map_err(|e| MCPError::ConnectionError(e.to_string()))?;

        // Verify the connection by sending an initialize request
        let response = client
            .post(format!("{}/rpc", url))
            .header("Content-Type", "application/json")
            .json(&self.create_initialize_request())
            .send()
            .await
            .map_err(|e| MCPError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MCPError::HttpError(format!(
                "HTTP error: {} - {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        self.http_client = Some(client);
        debug!("Successfully connected to MCP server via HTTP");
        Ok(())
    }

    /// Creates the initialize request.
    fn create_initialize_request(&self) -> Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {
                    "name": "mcp-chat",
                    "version": "0.1.0"
                }
            }
        })
    }

    /// Sends a message via stdio.
    fn send_message_stdio(&mut self, message: Value) -> Result<(), MCPError> {
        let message_str =
            serde_json::to_string(&message).map_err(|e| MCPError::ProtocolError(e.to_string()))?;

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| MCPError::ConnectionError("Not connected".to_string()))?;

        stdin
            .write_all(message_str.as_bytes())
            .map_err(|e| MCPError::ConnectionError(format!("Failed to write to stdin: {}", e)))?;
        stdin
            .write_all(b"\n")
            .map_err(|e| MCPError::ConnectionError(format!("Failed to write newline: {}", e)))?;

        Ok(())
    }

    /// Reads a JSON-RPC response line from stdout, skipping non-JSON lines.
    async fn read_json_response(&self) -> Result<Value, MCPError> {
        let reader_arc = self
            .stdout_reader
            .as_ref()
            .ok_or_else(|| MCPError::ConnectionError("Not connected".to_string()))?;

        // Keep reading until we get valid JSON
        loop {
            let reader_arc_clone = reader_arc.clone();

            let line = task::spawn_blocking(move || {
                let mut reader = reader_arc_clone.lock().map_err(|e| {
                    MCPError::ProtocolError(format!("Failed to lock reader: {}", e))
                })?;

                let mut line = String::new();
                reader.read_line(&mut line).map_err(|e| {
                    MCPError::ProtocolError(format!("Failed to read response: {}", e))
                })?;

                let trimmed = line.trim();
                if trimmed.is_empty() {
                    return Ok::<Option<Value>, MCPError>(None);
                }

                match serde_json::from_str::<Value>(trimmed) {
                    Ok(json) => Ok(Some(json)),
                    Err(_) => {
                        // Might be a log line from the server
                        debug!("Skipping non-JSON line: {}", trimmed);
                        Ok(None)
                    }
                }
            })
            .await
            .map_err(|e| MCPError::ProtocolError(format!("Task error: {}", e)))??;

            if let Some(json) = line {
                return Ok(json);
            }
        }
    }

    /// Disconnects from the MCP server.
    pub async fn disconnect(&mut self) -> Result<(), MCPError> {
        // Closing stdin lets the child exit on its own
        self.stdin = None;
        self.stdout_reader = None;

        if let Some(mut process) = self.process.take() {
            let _ = process.kill();
            process.wait().map_err(|e| {
                MCPError::ConnectionError(format!("Failed to wait for process: {}", e))
            })?;
        }

        self.http_client = None;

        Ok(())
    }

    /// Lists available tools from the MCP server.
    pub async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, MCPError> {
        let request =
            self.create_json_rpc_request("tools/list", Value::Object(serde_json::Map::new()));

        let result = self.call(request).await?;

        let tools: Vec<WireToolInfo> = serde_json::from_value(
            result
                .get("tools")
                .cloned()
                .unwrap_or_else(|| serde_json::json!([])),
        )
        .map_err(|e| MCPError::ProtocolError(e.to_string()))?;

        Ok(tools.into_iter().map(WireToolInfo::into_descriptor).collect())
    }

    /// Calls a tool on the MCP server.
    ///
    /// Returns the raw JSON-RPC `result` member unmodified; interpreting
    /// structured vs plain-text payloads is up to the caller.
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<Value, MCPError> {
        let params = serde_json::json!({
            "name": name,
            "arguments": arguments
        });

        let request = self.create_json_rpc_request("tools/call", params);
        self.call(request).await
    }

    /// Sends one JSON-RPC request and returns its `result` member.
    async fn call(&mut self, request: Value) -> Result<Value, MCPError> {
        // Clone the transport config so we can use it while mutating self
        let transport = self.config.transport.clone();

        let response = match transport {
            MCPTransport::Stdio { .. } => {
                self.send_message_stdio(request)?;
                self.read_json_response().await?
            }
            MCPTransport::Http { url } => self.call_http(request, &url).await?,
        };

        if let Some(error) = response.get("error") {
            return Err(MCPError::ExecutionError(error.to_string()));
        }

        response
            .get("result")
            .cloned()
            .ok_or_else(|| MCPError::ProtocolError("No result in response".to_string()))
    }

    /// Creates a JSON-RPC request.
    fn create_json_rpc_request(&self, method: &str, params: Value) -> Value {
        let id = self
            .message_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        })
    }

    /// Performs one JSON-RPC exchange over HTTP.
    async fn call_http(&self, request: Value, url: &str) -> Result<Value, MCPError> {
        let client = self
            .http_client
            .as_ref()
            .ok_or_else(|| MCPError::ConnectionError("Not connected".to_string()))?;

        let response = client
            .post(format!("{}/rpc", url))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| MCPError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MCPError::HttpError(format!(
                "HTTP error: {} - {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MCPError::ProtocolError(e.to_string()))
    }
}

/// Tool metadata as it appears on the MCP wire.
#[derive(Debug, Clone, Deserialize)]
struct WireToolInfo {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(rename = "inputSchema", default)]
    input_schema: Value,
}

impl WireToolInfo {
    fn into_descriptor(self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name,
            description: self.description,
            input_schema: self.input_schema,
        }
    }
}

impl Drop for MCPClient {
    fn drop(&mut self) {
        if let Some(mut process) = self.process.take() {
            let _ = process.kill();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_tool_info_reads_camel_case_schema() {
        let tools: Vec<WireToolInfo> = serde_json::from_value(serde_json::json!([
            {
                "name": "search_flights",
                "description": "Search flights",
                "inputSchema": {"type": "object", "properties": {"from": {"type": "string"}}}
            },
            {"name": "bare"}
        ]))
        .unwrap();

        let descriptors: Vec<ToolDescriptor> = tools
            .into_iter()
            .map(WireToolInfo::into_descriptor)
            .collect();

        assert_eq!(descriptors[0].name, "search_flights");
        assert_eq!(descriptors[0].input_schema["type"], "object");
        assert_eq!(descriptors[1].description, "");
        assert!(descriptors[1].input_schema.is_null());
    }

    #[test]
    fn builder_requires_name_and_transport() {
        assert!(MCPClient::builder().build().is_err());
        assert!(
            MCPClient::builder()
                .with_name("svc")
                .with_stdio_transport("cat", vec![])
                .build()
                .is_ok()
        );
    }
}
