//! Per-session conversation state.

use crate::types::{Message, Role};

/// Transcript plus turn accounting, owned by exactly one session task.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    pub transcript: Vec<Message>,
    /// Dispatches since the last `send`.
    pub turn_count: u32,
    /// 0 = unbounded.
    pub max_turns: u32,
    /// 0 = compaction disabled.
    pub context_budget_tokens: u32,
}

impl ConversationState {
    pub fn new(system_prompt: Option<&str>, max_turns: u32, context_budget_tokens: u32) -> Self {
        Self {
            transcript: system_prompt.map(Message::system).into_iter().collect(),
            turn_count: 0,
            max_turns,
            context_budget_tokens,
        }
    }

    /// Append the caller's message and reset turn accounting.
    pub fn begin_round(&mut self, text: impl Into<String>) {
        self.transcript.push(Message::user(text));
        self.turn_count = 0;
    }

    /// Count one dispatch. Returns true when this dispatch exceeds
    /// `max_turns` and must go out without tool declarations.
    pub fn begin_turn(&mut self) -> bool {
        self.turn_count = self.turn_count.saturating_add(1);
        self.max_turns > 0 && self.turn_count > self.max_turns
    }

    pub fn system_message(&self) -> Option<&Message> {
        self.transcript.iter().find(|m| m.role == Role::System)
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.transcript.last()
    }
}
