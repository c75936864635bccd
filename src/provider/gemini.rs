//! Google Gemini `generateContent` adapter.

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use serde::Deserialize;
use tracing::debug;

use crate::error::ChatError;
use crate::types::*;

use super::http::{json_headers, normalize_base_url, post_json};
use super::{Backend, ProviderAdapter, ProviderRequest, ProviderResponse, ResponsePart, ToolCallStyle};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Adapter for Gemini models. Function calls and responses are matched by
/// function name.
#[derive(Debug, Clone)]
pub struct GeminiAdapter {
    model: String,
    api_key: String,
    base_url: String,
}

impl GeminiAdapter {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: normalize_base_url(base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)),
        }
    }

    fn build_request_body(&self, request: &ProviderRequest) -> serde_json::Value {
        let mut system_texts = Vec::new();
        let mut contents = Vec::new();

        for msg in &request.messages {
            match msg.role {
                Role::System => system_texts.push(msg.content.clone()),
                Role::User => contents.push(serde_json::json!({
                    "role": "user",
                    "parts": [{"text": msg.content}],
                })),
                Role::Assistant => {
                    let mut parts = Vec::new();
                    if !msg.content.is_empty() {
                        parts.push(serde_json::json!({"text": msg.content}));
                    }
                    for tc in &msg.tool_calls {
                        parts.push(serde_json::json!({
                            "functionCall": {"name": tc.name, "args": tc.arguments}
                        }));
                    }
                    if !parts.is_empty() {
                        contents.push(serde_json::json!({"role": "model", "parts": parts}));
                    }
                }
                Role::Tool => {
                    let part = match &msg.name {
                        Some(name) => serde_json::json!({
                            "functionResponse": {
                                "name": name,
                                "response": {"content": msg.content},
                            }
                        }),
                        None => serde_json::json!({"text": msg.content}),
                    };
                    contents.push(serde_json::json!({"role": "user", "parts": [part]}));
                }
            }
        }

        let mut obj = serde_json::Map::new();
        obj.insert("contents".into(), contents.into());
        if !system_texts.is_empty() {
            obj.insert(
                "systemInstruction".into(),
                serde_json::json!({"parts": [{"text": system_texts.join("\n\n")}]}),
            );
        }

        let settings = &request.settings;
        let mut gen_config = serde_json::Map::new();
        if let Some(max) = settings.max_tokens {
            gen_config.insert("maxOutputTokens".into(), max.into());
        }
        if let Some(temp) = settings.temperature {
            gen_config.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = settings.top_p {
            gen_config.insert("topP".into(), top_p.into());
        }
        if let Some(seed) = settings.seed {
            gen_config.insert("seed".into(), seed.into());
        }
        if let Some(penalty) = settings.repeat_penalty {
            gen_config.insert("frequencyPenalty".into(), penalty.into());
        }
        if !gen_config.is_empty() {
            obj.insert("generationConfig".into(), serde_json::Value::Object(gen_config));
        }

        if !request.tools.is_empty() {
            let fn_decls: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    })
                })
                .collect();
            obj.insert(
                "tools".into(),
                serde_json::json!([{"functionDeclarations": fn_decls}]),
            );
        }

        serde_json::Value::Object(obj)
    }
}

#[async_trait]
impl ProviderAdapter for GeminiAdapter {
    fn backend(&self) -> Backend {
        Backend::Gemini
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    fn tool_call_style(&self) -> ToolCallStyle {
        ToolCallStyle::Typed
    }

    async fn submit(&self, request: &ProviderRequest) -> Result<ProviderResponse, ChatError> {
        let body = self.build_request_body(request);
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        debug!(model = %self.model, messages = request.messages.len(), "Gemini submit");

        let mut headers = json_headers(None);
        let key = HeaderValue::from_str(&self.api_key)
            .map_err(|_| ChatError::Configuration("Gemini API key is not a valid header".into()))?;
        headers.insert("x-goog-api-key", key);

        let data: GeminiResponse = post_json(&url, headers, &body).await?;
        let candidate = data
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ChatError::UnrecognizedResponse("no candidates in Gemini response".into()))?;

        let parts = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(convert_part)
            .collect();

        let usage = data
            .usage_metadata
            .map(|u| Usage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
                total_tokens: u.total_token_count,
            })
            .unwrap_or_default();
        debug!(
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Gemini usage"
        );

        Ok(ProviderResponse {
            parts,
            usage,
            finish_reason: candidate
                .finish_reason
                .as_deref()
                .and_then(FinishReason::parse_lenient),
        })
    }
}

fn convert_part(part: GeminiPart) -> Option<ResponsePart> {
    if let Some(fc) = part.function_call {
        let mut call = ToolCall::new(fc.name, fc.args.unwrap_or_else(|| serde_json::json!({})));
        call.id = fc.id;
        return Some(ResponsePart::ToolCall(call));
    }
    if let Some(text) = part.text {
        if part.thought {
            return None;
        }
        return Some(ResponsePart::Text(text));
    }
    part.other
        .keys()
        .find(|k| k.as_str() != "thoughtSignature")
        .map(|k| ResponsePart::Unrecognized(k.clone()))
}

// Gemini API response types (internal)

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
    function_call: Option<GeminiFunctionCall>,
    #[serde(flatten)]
    other: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct GeminiFunctionCall {
    #[serde(default)]
    id: Option<String>,
    name: String,
    args: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_part_kinds_are_reported_by_name() {
        let part: GeminiPart =
            serde_json::from_value(json!({"inlineData": {"mimeType": "image/png", "data": ""}}))
                .unwrap();
        assert_eq!(
            convert_part(part),
            Some(ResponsePart::Unrecognized("inlineData".into()))
        );
    }

    #[test]
    fn function_responses_are_keyed_by_name() {
        let adapter = GeminiAdapter::new("gemini-2.0-flash", "key", None);
        let call = ToolCall::new("pwd", json!({}));
        let messages = vec![
            Message::system("be brief"),
            Message::user("where?"),
            Message::assistant_with_tool_calls("", vec![call.clone()]),
            Message::tool_result(&call, "/tmp"),
        ];
        let body = adapter.build_request_body(&ProviderRequest::new(messages, GenerationSettings::default()));

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], json!("be brief"));
        assert_eq!(body["contents"][1]["parts"][0]["functionCall"]["name"], json!("pwd"));
        assert_eq!(
            body["contents"][2]["parts"][0]["functionResponse"],
            json!({"name": "pwd", "response": {"content": "/tmp"}})
        );
    }
}
