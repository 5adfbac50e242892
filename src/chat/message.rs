use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// User message
    User,
    /// Assistant message (from the LLM)
    Assistant,
    /// Tool result message
    Tool,
}

impl Role {
    /// The wire name used by chat-completions APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A tool call as requested by the language model.
///
/// `arguments` is kept as the raw JSON blob the model produced; parsing is
/// deferred to the invoker so malformed blobs surface as argument errors at
/// dispatch time rather than being silently replaced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Identifier assigned by the model
    pub id: String,
    /// The name of the tool to call
    pub name: String,
    /// Raw JSON-encoded arguments
    pub arguments: String,
}

/// One entry of a model request transcript.
///
/// Persistent history only ever contains `Text` entries; the other variants
/// exist for feeding tool rounds back to the model within a single turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TranscriptMessage {
    /// Plain text content
    Text {
        /// The sender role
        role: Role,
        /// The text content
        content: String,
    },
    /// An assistant message carrying tool-call requests
    ToolCalls {
        /// The requested calls, in model order
        calls: Vec<ToolCallRequest>,
    },
    /// The result of one tool call, fed back to the model
    ToolOutput {
        /// The ID of the tool call this result answers
        tool_call_id: String,
        /// The tool name
        name: String,
        /// Text content extracted from the tool response
        content: String,
    },
}

impl TranscriptMessage {
    /// Creates a plain text entry.
    pub fn text(role: Role, content: impl Into<String>) -> Self {
        Self::Text {
            role,
            content: content.into(),
        }
    }
}

/// One retained history entry: a role and what was said.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The sender role
    pub role: Role,
    /// The text content
    pub content: String,
    /// Timestamp when the entry was recorded
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Creates a new entry stamped with the current time.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}
