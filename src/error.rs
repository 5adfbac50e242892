//! Error types for the mcp-chat library.

use thiserror::Error;

/// Unified error type for a conversation turn.
///
/// Every variant is terminal for the current turn: nothing is retried, the
/// error is surfaced to the front-end and the turn ends.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Model endpoint error
    #[error("LLM error: {0}")]
    LLM(#[from] crate::llm::LLMError),

    /// Tool resolution or invocation error
    #[error("Tool error: {0}")]
    Tool(#[from] crate::tool::ToolError),

    /// MCP transport error
    #[error("MCP error: {0}")]
    MCP(#[from] crate::mcp::MCPError),

    /// Iterative mode exceeded its step cap
    #[error("Max steps exceeded")]
    MaxStepsExceeded,
}
