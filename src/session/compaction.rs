//! Token estimation and context compaction.

use std::sync::Arc;

use tracing::info;

use crate::error::ChatError;
use crate::generation::generate;
use crate::provider::ProviderAdapter;
use crate::types::{GenerationSettings, Message, Role, Usage};
use crate::util::retry::RetryPolicy;

/// Counts tokens in a piece of text.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// Roughly four characters per token.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicTokenCounter;

impl TokenCounter for HeuristicTokenCounter {
    fn count(&self, text: &str) -> usize {
        estimate_text_tokens(text)
    }
}

pub fn estimate_text_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Transcript after a compaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Compacted {
    pub transcript: Vec<Message>,
    pub usage: Usage,
}

/// Replaces an over-budget transcript with a model-written summary.
///
/// Compaction is lossy. The rebuilt transcript holds only the system message,
/// the first user message and one user message carrying the summary; tool
/// calls, their results and every other turn survive only as far as the
/// summary mentions them.
#[derive(Clone)]
pub struct ContextCompactor {
    budget_tokens: u32,
    include_system: bool,
    summary_words: u32,
    counter: Arc<dyn TokenCounter>,
}

impl std::fmt::Debug for ContextCompactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextCompactor")
            .field("budget_tokens", &self.budget_tokens)
            .field("include_system", &self.include_system)
            .field("summary_words", &self.summary_words)
            .finish_non_exhaustive()
    }
}

impl ContextCompactor {
    /// A compactor with the given budget. 0 disables compaction.
    pub fn new(budget_tokens: u32) -> Self {
        Self {
            budget_tokens,
            include_system: true,
            summary_words: 5000,
            counter: Arc::new(HeuristicTokenCounter),
        }
    }

    pub fn with_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.counter = counter;
        self
    }

    pub fn with_include_system(mut self, include: bool) -> Self {
        self.include_system = include;
        self
    }

    pub fn with_summary_words(mut self, words: u32) -> Self {
        self.summary_words = words;
        self
    }

    pub fn budget_tokens(&self) -> u32 {
        self.budget_tokens
    }

    pub fn estimate(&self, transcript: &[Message]) -> usize {
        transcript
            .iter()
            .filter(|m| self.include_system || m.role != Role::System)
            .map(|m| {
                let calls: usize = m
                    .tool_calls
                    .iter()
                    .map(|c| self.counter.count(&c.name) + self.counter.count(&c.arguments_text()))
                    .sum();
                self.counter.count(&m.content) + calls
            })
            .sum()
    }

    pub fn needs_compaction(&self, transcript: &[Message]) -> bool {
        self.budget_tokens > 0 && self.estimate(transcript) > self.budget_tokens as usize
    }

    /// Compact `transcript` if it is over budget. `None` means it was left
    /// as is.
    pub async fn compact(
        &self,
        transcript: &[Message],
        adapter: &dyn ProviderAdapter,
        retry: &RetryPolicy,
        settings: &GenerationSettings,
    ) -> Result<Option<Compacted>, ChatError> {
        if !self.needs_compaction(transcript) {
            return Ok(None);
        }

        let before = self.estimate(transcript);
        let prompt = format!(
            "Compact this conversation into {} words or less. Do not include any word counts or summarizing. Just return the summarized content.\n{}",
            self.summary_words,
            serialize_for_summary(transcript)
        );
        let summary = generate(adapter, retry, None, &prompt, settings).await?;

        let mut rebuilt = Vec::with_capacity(3);
        if let Some(system) = transcript.iter().find(|m| m.role == Role::System) {
            rebuilt.push(system.clone());
        }
        if let Some(first_user) = transcript.iter().find(|m| m.role == Role::User) {
            rebuilt.push(first_user.clone());
        }
        rebuilt.push(Message::user(summary.text));

        info!(
            before_tokens = before,
            after_tokens = self.estimate(&rebuilt),
            budget = self.budget_tokens,
            "Compacted conversation"
        );

        Ok(Some(Compacted {
            transcript: rebuilt,
            usage: summary.usage,
        }))
    }
}

/// One `[role] text` line per non-system message.
pub fn serialize_for_summary(transcript: &[Message]) -> String {
    let mut lines = Vec::with_capacity(transcript.len());
    for message in transcript.iter().filter(|m| m.role != Role::System) {
        let role = message.role.as_str();
        if !message.content.is_empty() {
            lines.push(format!("[{role}] {}", message.content));
        }
        for call in &message.tool_calls {
            lines.push(format!("[{role}] called {}({})", call.name, call.arguments_text()));
        }
    }
    lines.join("\n")
}
