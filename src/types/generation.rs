//! Generation settings and related enums.

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Settings controlling text generation.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct GenerationSettings {
    /// Maximum output tokens (`num_predict` on Ollama).
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub seed: Option<i64>,
    /// Repetition penalty (`frequency_penalty` on OpenAI-style backends).
    pub repeat_penalty: Option<f64>,
    /// Context window size in tokens (`num_ctx` on Ollama).
    ///
    /// Also the transcript budget that triggers compaction.
    pub context_window: Option<u32>,
}

impl GenerationSettings {
    /// Copy of these settings with a different output token cap.
    pub fn with_max_tokens(&self, max_tokens: u32) -> Self {
        Self {
            max_tokens: Some(max_tokens),
            ..self.clone()
        }
    }
}

/// Why generation finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Error,
}

impl FinishReason {
    /// Map a backend finish string onto a known reason.
    pub fn parse_lenient(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "stop" | "end_turn" => Some(Self::Stop),
            "length" | "max_tokens" => Some(Self::Length),
            "tool_calls" | "function_call" => Some(Self::ToolCalls),
            "content_filter" | "safety" => Some(Self::ContentFilter),
            _ => None,
        }
    }
}
