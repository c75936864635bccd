//! HTTP adapters against a mock server.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{pwd_tool, RecordingSleeper};
use toolchat::error::ChatError;
use toolchat::provider::gemini::GeminiAdapter;
use toolchat::provider::ollama::OllamaAdapter;
use toolchat::provider::openai::OpenAiAdapter;
use toolchat::provider::{EmbeddingProvider, ProviderAdapter, ProviderRequest, ResponsePart};
use toolchat::session::ChatSession;
use toolchat::tools::{Tool, ToolRegistry};
use toolchat::types::{GenerationSettings, Message, ToolCall};
use toolchat::util::retry::RetryPolicy;

fn user_request(text: &str) -> ProviderRequest {
    ProviderRequest::new(vec![Message::user(text)], GenerationSettings::default())
}

#[tokio::test]
async fn openai_tool_call_is_parsed_with_raw_arguments() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "gpt-4o-mini",
            "tools": [{"type": "function", "function": {"name": "pwd"}}],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_9",
                        "type": "function",
                        "function": {"name": "pwd", "arguments": "{ }"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = OpenAiAdapter::new("gpt-4o-mini", "test-key", Some(server.uri()));
    let request = user_request("where?").with_tools(vec![pwd_tool().declaration()]);
    let response = adapter.submit(&request).await.unwrap();

    match &response.parts[..] {
        [ResponsePart::ToolCall(call)] => {
            assert_eq!(call.id.as_deref(), Some("call_9"));
            assert_eq!(call.name, "pwd");
            assert_eq!(call.arguments_text(), "{ }");
        }
        other => panic!("Expected one tool call, got {:?}", other),
    }
    assert_eq!(response.usage.total_tokens, 15);
}

#[tokio::test]
async fn openai_replays_calls_and_results_by_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                {"role": "user", "content": "where?"},
                {
                    "role": "assistant",
                    "tool_calls": [{"id": "call_1", "function": {"name": "pwd", "arguments": "{}"}}]
                },
                {"role": "tool", "tool_call_id": "call_1", "content": "/tmp"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "In /tmp."}, "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let call = ToolCall::from_raw_arguments("pwd", "{}").with_id("call_1");
    let request = ProviderRequest::new(
        vec![
            Message::user("where?"),
            Message::assistant_with_tool_calls("", vec![call.clone()]),
            Message::tool_result(&call, "/tmp"),
        ],
        GenerationSettings::default(),
    );
    let adapter = OpenAiAdapter::new("gpt-4o-mini", "test-key", Some(server.uri()));
    assert_eq!(adapter.submit(&request).await.unwrap().text(), "In /tmp.");
}

#[tokio::test]
async fn rate_limit_status_maps_to_retryable_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "2"))
        .mount(&server)
        .await;

    let adapter = OpenAiAdapter::new("gpt-4o-mini", "test-key", Some(server.uri()));
    match adapter.submit(&user_request("hi")).await {
        Err(e @ ChatError::RateLimited { .. }) => {
            assert!(e.is_retryable());
            assert_eq!(e.retry_after_ms(), Some(2_000));
        }
        other => panic!("Expected RateLimited, got {:?}", other),
    }
}

#[tokio::test]
async fn auth_and_server_errors_are_classified() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .mount(&server)
        .await;

    let openai = OpenAiAdapter::new("gpt-4o-mini", "wrong", Some(server.uri()));
    assert!(matches!(
        openai.submit(&user_request("hi")).await,
        Err(ChatError::Authentication(_))
    ));

    let ollama = OllamaAdapter::new("llama3.1", Some(server.uri()));
    match ollama.submit(&user_request("hi")).await {
        Err(e @ ChatError::Api { status: 500, .. }) => assert!(e.is_retryable()),
        other => panic!("Expected Api 500, got {:?}", other),
    }
}

#[tokio::test]
async fn session_retries_through_transient_http_failures() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"content": "back online"}, "finish_reason": "stop"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let retry = RetryPolicy::new(6, Duration::from_secs(1), Duration::from_secs(30))
        .with_sleeper(sleeper.clone());
    let adapter = Arc::new(OpenAiAdapter::new("gpt-4o-mini", "test-key", Some(server.uri())));

    let mut session = ChatSession::builder(adapter).retry(retry).spawn();
    assert_eq!(session.ask("status?").await.unwrap(), "back online");
    assert_eq!(sleeper.recorded().len(), 2);
}

#[tokio::test]
async fn ollama_sends_options_and_reads_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "model": "llama3.1",
            "stream": false,
            "options": {"num_ctx": 8192, "temperature": 0.5},
            "messages": [{"role": "tool", "content": "Tool pwd returned: /tmp"}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"role": "assistant", "content": "{\"name\": \"pwd\", \"arguments\": {}}"},
            "done_reason": "stop",
            "prompt_eval_count": 40,
            "eval_count": 9,
            "prompt_eval_duration": 1000000,
            "eval_duration": 2000000
        })))
        .expect(1)
        .mount(&server)
        .await;

    let call = ToolCall::new("pwd", json!({}));
    let settings = GenerationSettings::builder()
        .context_window(8192)
        .temperature(0.5)
        .build();
    let request = ProviderRequest::new(vec![Message::tool_result(&call, "/tmp")], settings);

    let adapter = OllamaAdapter::new("llama3.1", Some(server.uri()));
    let response = adapter.submit(&request).await.unwrap();
    assert_eq!(response.text(), "{\"name\": \"pwd\", \"arguments\": {}}");
    assert_eq!(response.usage.total_tokens, 49);
}

#[tokio::test]
async fn ollama_text_embedded_call_drives_a_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"content": "```json\n{\"name\": \"pwd\", \"arguments\": {}}\n```"}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": {"content": "You are in /tmp."}
        })))
        .mount(&server)
        .await;

    let registry = ToolRegistry::new().with_tool(pwd_tool()).unwrap();
    let adapter = Arc::new(OllamaAdapter::new("qwen2.5", Some(server.uri())));
    let mut session = ChatSession::builder(adapter)
        .tools(Arc::new(registry))
        .spawn();

    assert_eq!(session.ask("where?").await.unwrap(), "You are in /tmp.");
    let transcript = session.close().await.unwrap();
    assert_eq!(transcript.len(), 4);
}

#[tokio::test]
async fn gemini_function_calls_and_unknown_parts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .and(header("x-goog-api-key", "g-key"))
        .and(body_partial_json(json!({
            "systemInstruction": {"parts": [{"text": "Be brief."}]}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "thinking...", "thought": true},
                    {"functionCall": {"name": "pwd", "args": {}}},
                    {"inlineData": {"mimeType": "image/png", "data": "AAAA"}}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 5, "candidatesTokenCount": 2, "totalTokenCount": 7}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = GeminiAdapter::new("gemini-2.0-flash", "g-key", Some(server.uri()));
    let request = ProviderRequest::new(
        vec![Message::system("Be brief."), Message::user("where?")],
        GenerationSettings::default(),
    );
    let response = adapter.submit(&request).await.unwrap();

    assert_eq!(response.parts.len(), 2);
    assert!(matches!(&response.parts[0], ResponsePart::ToolCall(c) if c.name == "pwd"));
    assert_eq!(
        response.parts[1],
        ResponsePart::Unrecognized("inlineData".into())
    );
    assert_eq!(response.usage.total_tokens, 7);
}

#[tokio::test]
async fn gemini_function_results_are_sent_by_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-2.0-flash:generateContent"))
        .and(body_partial_json(json!({
            "contents": [
                {"role": "user"},
                {"role": "model", "parts": [{"functionCall": {"name": "pwd"}}]},
                {"role": "user", "parts": [{"functionResponse": {"name": "pwd", "response": {"content": "/tmp"}}}]}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "In /tmp."}]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let call = ToolCall::new("pwd", json!({}));
    let request = ProviderRequest::new(
        vec![
            Message::user("where?"),
            Message::assistant_with_tool_calls("", vec![call.clone()]),
            Message::tool_result(&call, "/tmp"),
        ],
        GenerationSettings::default(),
    );
    let adapter = GeminiAdapter::new("gemini-2.0-flash", "g-key", Some(server.uri()));
    assert_eq!(adapter.submit(&request).await.unwrap().text(), "In /tmp.");
}

#[tokio::test]
async fn embeddings_keep_input_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(body_partial_json(json!({"model": "text-embedding-3-small"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({"model": "nomic-embed-text"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.5, 0.5]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let openai = OpenAiAdapter::new("gpt-4o-mini", "test-key", Some(server.uri()));
    let vectors = openai
        .embed_batch(&["a".to_string(), "b".to_string()], None)
        .await
        .unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);

    let ollama = OllamaAdapter::new("llama3.1", Some(server.uri()));
    let single = ollama.embed("hello", Some("nomic-embed-text")).await.unwrap();
    assert_eq!(single, vec![0.5, 0.5]);
}
