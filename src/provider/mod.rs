//! Backend adapters.

pub mod embedding;
pub mod factory;
pub mod http;

#[cfg(feature = "gemini")]
pub mod gemini;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::ChatError;
use crate::tools::ToolDeclaration;
use crate::types::{FinishReason, GenerationSettings, Message, ToolCall, Usage};

pub use embedding::EmbeddingProvider;
pub use factory::create_adapter;

/// One turn sent to a backend.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    pub messages: Vec<Message>,
    /// Empty means the backend must answer in text.
    pub tools: Vec<ToolDeclaration>,
    pub settings: GenerationSettings,
}

impl ProviderRequest {
    pub fn new(messages: Vec<Message>, settings: GenerationSettings) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            settings,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDeclaration>) -> Self {
        self.tools = tools;
        self
    }
}

/// A single piece of a backend answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePart {
    Text(String),
    ToolCall(ToolCall),
    /// A part type the adapter does not understand, by its wire name.
    Unrecognized(String),
}

/// Answer to one [`ProviderRequest`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderResponse {
    pub parts: Vec<ResponsePart>,
    pub usage: Usage,
    pub finish_reason: Option<FinishReason>,
}

impl ProviderResponse {
    /// A response made of a single text part.
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            parts: vec![ResponsePart::Text(text.into())],
            finish_reason: Some(FinishReason::Stop),
            ..Self::default()
        }
    }

    /// Concatenated text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                ResponsePart::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// How a backend conveys tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ToolCallStyle {
    /// Typed call objects (Gemini `functionCall`).
    Typed,
    /// Calls written into the answer text (local models via Ollama).
    TextEmbedded,
    /// Typed calls with ids that must be replayed on every request.
    TypedWithHistoryReplay,
}

/// Backend kinds known to the configuration layer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    OpenAi,
    Ollama,
    Gemini,
    /// Recognized in configuration but not implemented.
    Anthropic,
}

/// Core trait implemented by every backend adapter.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn backend(&self) -> Backend;

    /// The model this adapter instance serves.
    fn model_id(&self) -> &str;

    fn tool_call_style(&self) -> ToolCallStyle;

    /// Send one turn and return the backend's answer.
    async fn submit(&self, request: &ProviderRequest) -> Result<ProviderResponse, ChatError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn backend_names_parse_case_insensitively() {
        assert_eq!(Backend::from_str("OpenAI").unwrap(), Backend::OpenAi);
        assert_eq!(Backend::from_str("ollama").unwrap(), Backend::Ollama);
        assert_eq!(Backend::OpenAi.to_string(), "openai");
        assert!(Backend::from_str("bard").is_err());
    }

    #[test]
    fn text_joins_text_parts_only() {
        let response = ProviderResponse {
            parts: vec![
                ResponsePart::Text("a".into()),
                ResponsePart::ToolCall(ToolCall::new("pwd", serde_json::json!({}))),
                ResponsePart::Text("b".into()),
            ],
            ..ProviderResponse::default()
        };
        assert_eq!(response.text(), "ab");
    }
}
