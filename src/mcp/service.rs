use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::mcp::client::MCPClient;
use crate::tool::{ToolDescriptor, ToolError, ToolService};

/// Adapter exposing a connected MCP client as a [`ToolService`].
#[derive(Debug, Clone)]
pub struct McpService {
    client: Arc<Mutex<MCPClient>>,
}

impl McpService {
    /// Wraps an already-connected MCP client.
    pub fn new(client: MCPClient) -> Self {
        Self {
            client: Arc::new(Mutex::new(client)),
        }
    }

    /// Disconnects the underlying client.
    pub async fn shutdown(&self) -> Result<(), ToolError> {
        self.client
            .lock()
            .await
            .disconnect()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}

#[async_trait]
impl ToolService for McpService {
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError> {
        let mut client = self.client.lock().await;
        client
            .list_tools()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolError> {
        let mut client = self.client.lock().await;
        client
            .call_tool(name, arguments)
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}
