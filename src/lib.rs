//! # mcp-chat
//!
//! A small chat front-end core that dispatches user messages to a language
//! model and routes the model's tool calls to MCP tool servers.
//!
//! ## Features
//!
//! - **Tool Registry**: tracks which connected service declared which tool
//! - **Tool Invoker**: parses model-produced argument blobs and dispatches
//!   calls to the owning service
//! - **Turn Handler**: one model round plus a synthesis call per message,
//!   or an iterative tool loop
//! - **OpenAI-compatible client**: works with any chat-completions endpoint
//! - **MCP Support**: stdio and HTTP transports for tool servers
//!
//! ## Quick Start
//!
//! ```no_run
//! use mcp_chat::prelude::*;
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create a model client (reads OPENAI_API_KEY / DEEPSEEK_API_KEY)
//!     let llm = LLMClientBuilder::new()
//!         .with_base_url("https://api.deepseek.com/v1")
//!         .build_openai()?;
//!
//!     // Connect an MCP tool server
//!     let mut mcp = MCPClient::builder()
//!         .with_name("travel")
//!         .with_stdio_transport("travel-tools", vec![])
//!         .build()?;
//!     mcp.connect().await?;
//!
//!     let invoker = ToolInvoker::new();
//!     invoker
//!         .connect("travel", std::sync::Arc::new(McpService::new(mcp)))
//!         .await?;
//!
//!     // Run one turn
//!     let handler = TurnHandler::with_defaults(Conversation::default(), llm, invoker);
//!     let (events, mut rx) = mpsc::unbounded_channel();
//!     let answer = handler.handle("Find me a flight to Tokyo", &events).await?;
//!
//!     while let Ok(event) = rx.try_recv() {
//!         println!("{:?}", event);
//!     }
//!     println!("{}", answer);
//!
//!     Ok(())
//! }
//! ```

pub mod chat;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod tool;

// Re-exports for convenient usage
pub use chat::{
    Conversation, ConversationHistory, HistoryEntry, Role, ToolCallRequest, TranscriptMessage,
    TurnConfig, TurnEvent, TurnHandler,
};
pub use error::ChatError;
pub use llm::client::LLMClientBuilder;
pub use llm::{LLMClient, LLMError, LLMInput, LLMOutput, OpenAIClient};
pub use mcp::{MCPClient, MCPClientBuilder, MCPConfig, MCPError, MCPTransport, McpService};
pub use tool::{
    DynToolService, ToolArguments, ToolDescriptor, ToolError, ToolInvoker, ToolRegistry,
    ToolService,
};

/// Prelude module with commonly used types.
pub mod prelude {
    pub use crate::chat::{Conversation, TurnConfig, TurnEvent, TurnHandler};
    pub use crate::error::ChatError;
    pub use crate::llm::{LLMClient, LLMClientBuilder, OpenAIClient};
    pub use crate::mcp::{MCPClient, McpService};
    pub use crate::tool::{ToolDescriptor, ToolError, ToolInvoker, ToolService};
}
