//! Bounded conversation memory and the per-session store.
//!
//! Each session owns an ordered log of turns capped at `max_messages`;
//! when the cap is exceeded the oldest turns are dropped first. The full
//! turn text is always retained for model context; only the
//! human-readable rendering truncates assistant replies.

use std::collections::{HashMap, VecDeque};

use crate::config::MemoryConfig;
use crate::llm::{ChatMessage, Role};

/// One conversation turn: a role-tagged text.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

/// Ordered, bounded log of conversation turns for one session.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    config: MemoryConfig,
    turns: VecDeque<Turn>,
}

impl ConversationMemory {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            turns: VecDeque::new(),
        }
    }

    /// Append a turn, evicting from the front until the retention cap
    /// holds again.
    pub fn append(&mut self, role: Role, text: impl Into<String>) {
        self.turns.push_back(Turn {
            role,
            text: text.into(),
        });
        while self.turns.len() > self.config.max_messages {
            self.turns.pop_front();
        }
    }

    /// All retained turns, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    /// Retained turns as chat messages for the model.
    pub fn as_messages(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .map(|t| ChatMessage {
                role: t.role,
                content: t.text.clone(),
            })
            .collect()
    }

    /// Render the most recent turns as `User:` / `Assistant:` lines.
    ///
    /// Shows at most `display_turns` turns and truncates assistant text to
    /// `display_truncate` characters (cosmetic only; the retained turns
    /// keep their full text).
    pub fn formatted_history(&self) -> String {
        if self.turns.is_empty() {
            return "No previous conversation.".to_string();
        }

        let skip = self.turns.len().saturating_sub(self.config.display_turns);
        let lines: Vec<String> = self
            .turns
            .iter()
            .skip(skip)
            .map(|t| match t.role {
                Role::User => format!("User: {}", t.text),
                Role::Assistant => format!(
                    "Assistant: {}",
                    truncate_chars(&t.text, self.config.display_truncate)
                ),
                Role::System => format!("System: {}", t.text),
            })
            .collect();

        lines.join("\n")
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{}...", truncated)
}

/// Owned map of session id → conversation memory.
///
/// Injected into the conversation engine rather than living in process
/// globals, so tests can run several independent sessions deterministically.
#[derive(Debug, Default)]
pub struct SessionStore {
    config: MemoryConfig,
    sessions: HashMap<String, ConversationMemory>,
}

impl SessionStore {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
        }
    }

    /// Fetch a session's memory, lazily creating an empty one on first
    /// reference.
    pub fn create_or_get(&mut self, session_id: &str) -> &mut ConversationMemory {
        let config = self.config.clone();
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| ConversationMemory::new(config))
    }

    pub fn clear(&mut self, session_id: &str) {
        if let Some(memory) = self.sessions.get_mut(session_id) {
            memory.clear();
        }
    }

    pub fn clear_all(&mut self) {
        self.sessions.clear();
    }
}
