pub mod registry;
pub mod invoker;

pub use registry::ToolRegistry;
pub use invoker::{ToolArguments, ToolInvocation, ToolInvoker};
pub use tool_types::{ToolDescriptor, ToolError};
pub use tool_service::{DynToolService, ToolService};

mod tool_types {
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    /// Definition of a tool as declared by the service that owns it.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ToolDescriptor {
        /// The name of the tool
        pub name: String,
        /// A description of what the tool does
        pub description: String,
        /// JSON Schema for the tool's input parameters
        pub input_schema: Value,
    }

    /// Errors that can occur when resolving or invoking a tool.
    #[derive(Debug, thiserror::Error)]
    pub enum ToolError {
        #[error("Invalid arguments: {0}")]
        InvalidArguments(String),
        #[error("Execution failed: {0}")]
        ExecutionFailed(String),
        #[error("Tool not found: {0}")]
        NotFound(String),
    }
}

mod tool_service {
    use super::tool_types::{ToolDescriptor, ToolError};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Arc;

    /// Trait representing an external service that exposes tools.
    ///
    /// A service declares its tool list once at connect time and executes
    /// named tools on demand. The production implementation speaks MCP;
    /// tests substitute in-process stubs.
    #[async_trait]
    pub trait ToolService: Send + Sync {
        /// Returns the tools this service exposes.
        async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, ToolError>;

        /// Executes a named tool with already-parsed arguments and returns
        /// the service's raw response.
        async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, ToolError>;
    }

    /// A type alias for a dynamic tool service reference.
    pub type DynToolService = Arc<dyn ToolService>;
}
