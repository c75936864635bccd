//! OpenAI Chat Completions adapter.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::ChatError;
use crate::types::*;

use super::embedding::EmbeddingProvider;
use super::http::{json_headers, normalize_base_url, post_json};
use super::{Backend, ProviderAdapter, ProviderRequest, ProviderResponse, ResponsePart, ToolCallStyle};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Adapter for `/chat/completions`.
///
/// Tool calls carry ids and every earlier call is replayed with its exact
/// argument text on each request.
#[derive(Debug, Clone)]
pub struct OpenAiAdapter {
    model: String,
    api_key: String,
    base_url: String,
}

impl OpenAiAdapter {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: normalize_base_url(base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)),
        }
    }

    fn build_request_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let mut obj = serde_json::Map::new();
        obj.insert("model".into(), self.model.clone().into());
        obj.insert("messages".into(), messages_to_openai(&request.messages).into());

        let settings = &request.settings;
        if let Some(max) = settings.max_tokens {
            obj.insert("max_completion_tokens".into(), max.into());
        }
        if let Some(temp) = settings.temperature {
            obj.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = settings.top_p {
            obj.insert("top_p".into(), top_p.into());
        }
        if let Some(seed) = settings.seed {
            obj.insert("seed".into(), seed.into());
        }
        if let Some(penalty) = settings.repeat_penalty {
            obj.insert("frequency_penalty".into(), penalty.into());
        }

        if !request.tools.is_empty() {
            let tool_defs: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            obj.insert("tools".into(), tool_defs.into());
        }

        serde_json::Value::Object(obj)
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiAdapter {
    fn backend(&self) -> Backend {
        Backend::OpenAi
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn tool_call_style(&self) -> ToolCallStyle {
        ToolCallStyle::TypedWithHistoryReplay
    }

    async fn submit(&self, request: &ProviderRequest) -> Result<ProviderResponse, ChatError> {
        let body = self.build_request_body(request);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "OpenAI submit"
        );

        let data: OpenAiChatResponse = post_json(&url, json_headers(Some(&self.api_key)), &body).await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::UnrecognizedResponse("no choices in OpenAI response".into()))?;

        let mut parts = Vec::new();
        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            parts.push(ResponsePart::Text(text));
        }
        for tc in choice.message.tool_calls.unwrap_or_default() {
            match (tc.kind.as_str(), tc.function) {
                ("function", Some(function)) => {
                    let call = ToolCall::from_raw_arguments(function.name, function.arguments)
                        .with_id(tc.id);
                    parts.push(ResponsePart::ToolCall(call));
                }
                (kind, _) => parts.push(ResponsePart::Unrecognized(kind.to_string())),
            }
        }

        let usage = data
            .usage
            .map(|u| Usage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();
        debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "OpenAI usage"
        );

        Ok(ProviderResponse {
            parts,
            usage,
            finish_reason: choice
                .finish_reason
                .as_deref()
                .and_then(FinishReason::parse_lenient),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiAdapter {
    async fn embed_batch(
        &self,
        texts: &[String],
        model: Option<&str>,
    ) -> Result<Vec<Vec<f32>>, ChatError> {
        let body = serde_json::json!({
            "model": model.unwrap_or(DEFAULT_EMBEDDING_MODEL),
            "input": texts,
        });
        let url = format!("{}/embeddings", self.base_url);
        let data: OpenAiEmbeddingResponse =
            post_json(&url, json_headers(Some(&self.api_key)), &body).await?;

        let mut rows = data.data;
        rows.sort_by_key(|row| row.index);
        Ok(rows.into_iter().map(|row| row.embedding).collect())
    }
}

/// Convert the transcript into chat-completions messages.
///
/// A tool message without a call id borrows the first call id of the
/// closest preceding assistant message; with none available it is sent as
/// assistant text.
fn messages_to_openai(messages: &[Message]) -> Vec<serde_json::Value> {
    let mut last_call_id: Option<&str> = None;
    let mut out = Vec::with_capacity(messages.len());

    for msg in messages {
        match msg.role {
            Role::System | Role::User => {
                out.push(serde_json::json!({"role": msg.role.as_str(), "content": msg.content}));
            }
            Role::Assistant if msg.has_tool_calls() => {
                last_call_id = msg.tool_calls.first().and_then(|c| c.id.as_deref());
                let calls: Vec<serde_json::Value> = msg
                    .tool_calls
                    .iter()
                    .map(|tc| {
                        serde_json::json!({
                            "id": tc.id,
                            "type": "function",
                            "function": {
                                "name": tc.name,
                                "arguments": tc.arguments_text(),
                            }
                        })
                    })
                    .collect();
                let content = if msg.content.is_empty() {
                    serde_json::Value::Null
                } else {
                    serde_json::Value::String(msg.content.clone())
                };
                out.push(serde_json::json!({
                    "role": "assistant",
                    "content": content,
                    "tool_calls": calls,
                }));
            }
            Role::Assistant => {
                last_call_id = None;
                out.push(serde_json::json!({"role": "assistant", "content": msg.content}));
            }
            Role::Tool => match msg.tool_call_id.as_deref().or(last_call_id) {
                Some(id) => out.push(serde_json::json!({
                    "role": "tool",
                    "tool_call_id": id,
                    "content": msg.content,
                })),
                None => out.push(serde_json::json!({"role": "assistant", "content": msg.content})),
            },
        }
    }

    out
}

// OpenAI API response types (internal)

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: Option<OpenAiFunction>,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Deserialize)]
struct OpenAiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
