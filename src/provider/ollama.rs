//! Ollama `/api/chat` adapter for locally hosted models.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::ChatError;
use crate::types::*;

use super::embedding::EmbeddingProvider;
use super::http::{json_headers, normalize_base_url, post_json};
use super::{Backend, ProviderAdapter, ProviderRequest, ProviderResponse, ResponsePart, ToolCallStyle};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

/// Adapter for models served by Ollama.
///
/// Many local models write their tool calls into the answer text instead of
/// using the native `tool_calls` field, so this adapter reports the
/// text-embedded style and leaves extraction to the session.
#[derive(Debug, Clone)]
pub struct OllamaAdapter {
    model: String,
    base_url: String,
}

impl OllamaAdapter {
    pub fn new(model: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            model: model.into(),
            base_url: normalize_base_url(base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)),
        }
    }

    fn build_request_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = request.messages.iter().map(message_to_ollama).collect();

        let settings = &request.settings;
        let mut options = serde_json::Map::new();
        if let Some(ctx) = settings.context_window {
            options.insert("num_ctx".into(), ctx.into());
        }
        if let Some(max) = settings.max_tokens {
            options.insert("num_predict".into(), max.into());
        }
        if let Some(temp) = settings.temperature {
            options.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = settings.top_p {
            options.insert("top_p".into(), top_p.into());
        }
        if let Some(seed) = settings.seed {
            options.insert("seed".into(), seed.into());
        }
        if let Some(penalty) = settings.repeat_penalty {
            options.insert("repeat_penalty".into(), penalty.into());
        }

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
        });
        if let Some(obj) = body.as_object_mut() {
            if !options.is_empty() {
                obj.insert("options".into(), serde_json::Value::Object(options));
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
        }
        body
    }
}

#[async_trait]
impl ProviderAdapter for OllamaAdapter {
    fn backend(&self) -> Backend {
        Backend::Ollama
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn tool_call_style(&self) -> ToolCallStyle {
        ToolCallStyle::TextEmbedded
    }

    async fn submit(&self, request: &ProviderRequest) -> Result<ProviderResponse, ChatError> {
        let body = self.build_request_body(request);
        let url = format!("{}/api/chat", self.base_url);

        debug!(model = %self.model, messages = request.messages.len(), "Ollama submit");

        let data: OllamaChatResponse = post_json(&url, json_headers(None), &body).await?;

        log_speed(&data);

        let mut parts = Vec::new();
        if !data.message.content.is_empty() {
            parts.push(ResponsePart::Text(data.message.content));
        }
        for tc in data.message.tool_calls {
            parts.push(ResponsePart::ToolCall(ToolCall::new(
                tc.function.name,
                tc.function.arguments,
            )));
        }

        Ok(ProviderResponse {
            parts,
            usage: Usage::new(data.prompt_eval_count, data.eval_count),
            finish_reason: data
                .done_reason
                .as_deref()
                .and_then(FinishReason::parse_lenient),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaAdapter {
    async fn embed_batch(
        &self,
        texts: &[String],
        model: Option<&str>,
    ) -> Result<Vec<Vec<f32>>, ChatError> {
        let body = serde_json::json!({
            "model": model.unwrap_or(DEFAULT_EMBEDDING_MODEL),
            "input": texts,
        });
        let url = format!("{}/api/embed", self.base_url);
        let data: OllamaEmbedResponse = post_json(&url, json_headers(None), &body).await?;
        Ok(data.embeddings)
    }
}

fn message_to_ollama(msg: &Message) -> serde_json::Value {
    match msg.role {
        Role::Tool => {
            let content = match &msg.name {
                Some(name) => format!("Tool {name} returned: {}", msg.content),
                None => msg.content.clone(),
            };
            serde_json::json!({"role": "tool", "content": content})
        }
        Role::Assistant if msg.has_tool_calls() => {
            let calls: Vec<serde_json::Value> = msg
                .tool_calls
                .iter()
                .map(|tc| {
                    let arguments = if tc.arguments.is_object() {
                        tc.arguments.clone()
                    } else {
                        serde_json::json!({})
                    };
                    serde_json::json!({"function": {"name": tc.name, "arguments": arguments}})
                })
                .collect();
            serde_json::json!({
                "role": "assistant",
                "content": msg.content,
                "tool_calls": calls,
            })
        }
        _ => serde_json::json!({"role": msg.role.as_str(), "content": msg.content}),
    }
}

fn log_speed(data: &OllamaChatResponse) {
    let per_second = |count: u32, nanos: u64| {
        if nanos == 0 {
            0.0
        } else {
            count as f64 / (nanos as f64 / 1e9)
        }
    };
    debug!(
        prompt_count = data.prompt_eval_count,
        eval_count = data.eval_count,
        prompt_speed = format!("{:.2}", per_second(data.prompt_eval_count, data.prompt_eval_duration)),
        eval_speed = format!("{:.2}", per_second(data.eval_count, data.eval_duration)),
        "Ollama usage (tokens/s)"
    );
}

// Ollama API response types (internal)

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
    #[serde(default)]
    prompt_eval_duration: u64,
    #[serde(default)]
    eval_duration: u64,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<OllamaToolCall>,
}

#[derive(Deserialize)]
struct OllamaToolCall {
    function: OllamaFunction,
}

#[derive(Deserialize)]
struct OllamaFunction {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn options_carry_context_and_output_limits() {
        let adapter = OllamaAdapter::new("qwen2.5", None);
        let settings = GenerationSettings::builder()
            .context_window(16_384)
            .max_tokens(5000)
            .repeat_penalty(1.1)
            .build();
        let body = adapter.build_request_body(&ProviderRequest::new(vec![Message::user("x")], settings));

        assert_eq!(body["stream"], json!(false));
        assert_eq!(body["options"]["num_ctx"], json!(16_384));
        assert_eq!(body["options"]["num_predict"], json!(5000));
        assert_eq!(body["options"]["repeat_penalty"], json!(1.1));
    }

    #[test]
    fn tool_results_name_the_tool() {
        let call = ToolCall::new("pwd", json!({}));
        let wire = message_to_ollama(&Message::tool_result(&call, "/tmp"));
        assert_eq!(wire, json!({"role": "tool", "content": "Tool pwd returned: /tmp"}));
    }
}
