use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chat::message::{HistoryEntry, Role, TranscriptMessage};

/// Default number of history entries carried into each model request.
pub const DEFAULT_HISTORY_CAP: usize = 6;

/// Bounded rolling conversation history.
///
/// Holds the most recent `cap` entries in order; pushing beyond the cap
/// evicts the oldest entry first. Never persisted across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    entries: VecDeque<HistoryEntry>,
    cap: usize,
}

impl ConversationHistory {
    /// Creates an empty history bounded at `cap` entries.
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Appends an entry, evicting the oldest if the cap is exceeded.
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.entries.push_back(HistoryEntry::new(role, content));
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
    }

    /// Returns the retained entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Converts the retained entries to a model request transcript.
    pub fn to_transcript(&self) -> Vec<TranscriptMessage> {
        self.entries
            .iter()
            .map(|entry| TranscriptMessage::text(entry.role, entry.content.clone()))
            .collect()
    }

    /// Returns the number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the configured cap.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Clears all retained entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

/// One conversation: an identifier and its bounded history.
///
/// Conversations are independent; several may run turns concurrently, each
/// behind its own lock. A single in-flight turn per conversation is
/// assumed, not enforced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique identifier for the conversation
    pub id: String,
    /// The bounded rolling history
    pub history: ConversationHistory,
}

impl Conversation {
    /// Creates a new conversation with the given history cap.
    pub fn new(history_cap: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            history: ConversationHistory::new(history_cap),
        }
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_keeps_entries_in_order() {
        let mut history = ConversationHistory::new(4);
        history.push(Role::User, "one");
        history.push(Role::Assistant, "two");

        let contents: Vec<_> = history.entries().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
    }

    #[test]
    fn eviction_keeps_exactly_the_newest_cap_entries() {
        let cap = 6;
        let mut history = ConversationHistory::new(cap);
        for i in 0..10 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            history.push(role, format!("message {}", i));
        }

        assert_eq!(history.len(), cap);
        let contents: Vec<_> = history.entries().map(|e| e.content.clone()).collect();
        let expected: Vec<_> = (4..10).map(|i| format!("message {}", i)).collect();
        assert_eq!(contents, expected);
    }

    #[test]
    fn to_transcript_preserves_roles() {
        let mut history = ConversationHistory::new(4);
        history.push(Role::User, "question");
        history.push(Role::Assistant, "answer");

        let transcript = history.to_transcript();
        assert_eq!(transcript.len(), 2);
        assert!(matches!(
            &transcript[0],
            TranscriptMessage::Text { role: Role::User, content } if content == "question"
        ));
        assert!(matches!(
            &transcript[1],
            TranscriptMessage::Text { role: Role::Assistant, content } if content == "answer"
        ));
    }
}
