use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::tool::{DynToolService, ToolDescriptor, ToolError, ToolRegistry};

/// Tool arguments as they arrive from the language model: either a raw JSON
/// blob still to be parsed, or an already-structured value.
#[derive(Debug, Clone)]
pub enum ToolArguments {
    /// A textual JSON blob (the form chat-completions APIs return)
    Text(String),
    /// An already-parsed JSON value
    Structured(Value),
}

impl From<Value> for ToolArguments {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

impl From<String> for ToolArguments {
    fn from(blob: String) -> Self {
        Self::Text(blob)
    }
}

impl From<&str> for ToolArguments {
    fn from(blob: &str) -> Self {
        Self::Text(blob.to_string())
    }
}

impl ToolArguments {
    /// Parses the arguments into a JSON value.
    ///
    /// Textual input that is not valid JSON fails here, before any service
    /// is contacted.
    fn into_value(self) -> Result<Value, ToolError> {
        match self {
            Self::Structured(value) => Ok(value),
            Self::Text(blob) => serde_json::from_str(&blob)
                .map_err(|e| ToolError::InvalidArguments(format!("{}: {}", e, blob))),
        }
    }
}

/// A resolved tool call: exists only for the duration of one dispatch.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// The tool being called
    pub tool_name: String,
    /// The parsed arguments
    pub arguments: Value,
    /// The service that owns the tool
    pub service_id: String,
}

/// Dispatches tool calls to the service that declared the tool.
///
/// Holds the shared [`ToolRegistry`] and the live connection handles.
/// Connect and disconnect notifications are the only mutation path into
/// either; turns read the registry once per message.
#[derive(Clone)]
pub struct ToolInvoker {
    registry: Arc<Mutex<ToolRegistry>>,
    services: Arc<Mutex<HashMap<String, DynToolService>>>,
}

impl ToolInvoker {
    /// Creates a new invoker with an empty registry.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(Mutex::new(ToolRegistry::new())),
            services: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers a newly connected service: lists its tools and records both
    /// the declarations and the connection handle.
    ///
    /// Returns the number of tools the service declared.
    pub async fn connect(
        &self,
        service_id: impl Into<String>,
        service: DynToolService,
    ) -> Result<usize, ToolError> {
        let service_id = service_id.into();
        let tools = service.list_tools().await?;
        let count = tools.len();

        self.registry.lock().await.register(service_id.clone(), tools);
        self.services
            .lock()
            .await
            .insert(service_id.clone(), service);

        info!(service = %service_id, tools = count, "service connected");
        Ok(count)
    }

    /// Removes a disconnected service. No-op if the service is unknown.
    pub async fn disconnect(&self, service_id: &str) {
        self.registry.lock().await.unregister(service_id);
        self.services.lock().await.remove(service_id);
        info!(service = %service_id, "service disconnected");
    }

    /// Returns all declared tools for passing to the language model.
    pub async fn tool_definitions(&self) -> Vec<ToolDescriptor> {
        self.registry.lock().await.tool_definitions()
    }

    /// Returns the connected service ids in registration order.
    pub async fn service_ids(&self) -> Vec<String> {
        self.registry.lock().await.service_ids()
    }

    /// Invokes a tool by name.
    ///
    /// Parses textual arguments, resolves the owning service via the
    /// registry, then performs the call and returns the service's raw
    /// response unmodified. The caller interprets structured vs plain-text
    /// payloads. There is no timeout or retry: a hung service call hangs
    /// the turn.
    pub async fn invoke(
        &self,
        tool_name: &str,
        raw_input: ToolArguments,
    ) -> Result<Value, ToolError> {
        let arguments = raw_input.into_value()?;

        let service_id = {
            let registry = self.registry.lock().await;
            registry.resolve(tool_name)?.to_string()
        };

        let service = {
            let services = self.services.lock().await;
            services
                .get(&service_id)
                .cloned()
                .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?
        };

        let invocation = ToolInvocation {
            tool_name: tool_name.to_string(),
            arguments,
            service_id,
        };
        debug!(
            tool = %invocation.tool_name,
            service = %invocation.service_id,
            "dispatching tool call"
        );

        service
            .call_tool(&invocation.tool_name, invocation.arguments)
            .await
    }
}

impl Default for ToolInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ToolInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolInvoker").finish_non_exhaustive()
    }
}
