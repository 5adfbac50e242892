pub mod history;
pub mod message;
pub mod turn;

pub use history::{Conversation, ConversationHistory, DEFAULT_HISTORY_CAP};
pub use message::{HistoryEntry, Role, ToolCallRequest, TranscriptMessage};
pub use turn::{DEFAULT_SYSTEM_PROMPT, TurnConfig, TurnEvent, TurnHandler};
