//! Tests for one-shot generation.

mod common;

use serde_json::json;

use common::{text_response, tool_call_response, ScriptedAdapter};
use toolchat::error::ChatError;
use toolchat::generation::generate;
use toolchat::provider::{ProviderResponse, ResponsePart, ToolCallStyle};
use toolchat::types::{GenerationSettings, Role, ToolCall};
use toolchat::util::retry::RetryPolicy;

#[tokio::test]
async fn generate_sends_system_and_prompt_without_tools() {
    let adapter = ScriptedAdapter::new(ToolCallStyle::Typed);
    adapter.queue_text("Paris");
    let settings = GenerationSettings::builder().temperature(0.0).build();

    let generated = generate(
        &adapter,
        &RetryPolicy::no_retry(),
        Some("Answer in one word."),
        "Capital of France?",
        &settings,
    )
    .await
    .unwrap();

    assert_eq!(generated.text, "Paris");
    assert_eq!(generated.usage.total_tokens, 30);

    let request = &adapter.recorded()[0];
    assert!(request.tools.is_empty());
    assert_eq!(request.settings.temperature, Some(0.0));
    let roles: Vec<Role> = request.messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![Role::System, Role::User]);
}

#[tokio::test]
async fn generate_ignores_stray_tool_calls() {
    let adapter = ScriptedAdapter::new(ToolCallStyle::Typed);
    let mut response = tool_call_response(vec![ToolCall::new("pwd", json!({}))]);
    response.parts.push(ResponsePart::Text("plain".into()));
    adapter.queue(Ok(response));

    let generated = generate(
        &adapter,
        &RetryPolicy::no_retry(),
        None,
        "hi",
        &GenerationSettings::default(),
    )
    .await
    .unwrap();
    assert_eq!(generated.text, "plain");
}

#[tokio::test]
async fn generate_rejects_unrecognized_parts() {
    let adapter = ScriptedAdapter::new(ToolCallStyle::Typed);
    adapter.queue(Ok(ProviderResponse {
        parts: vec![ResponsePart::Unrecognized("executableCode".into())],
        ..ProviderResponse::default()
    }));

    let result = generate(
        &adapter,
        &RetryPolicy::no_retry(),
        None,
        "run it",
        &GenerationSettings::default(),
    )
    .await;
    assert!(matches!(result, Err(ChatError::UnrecognizedResponse(kind)) if kind == "executableCode"));
}

#[tokio::test]
async fn generate_retries_transient_failures() {
    let adapter = ScriptedAdapter::new(ToolCallStyle::Typed);
    adapter
        .queue_error(ChatError::Unavailable("connection reset".into()))
        .queue(Ok(text_response("ok")));
    let (retry, sleeper) = common::recorded_retry(3);

    let generated = generate(&adapter, &retry, None, "ping", &GenerationSettings::default())
        .await
        .unwrap();
    assert_eq!(generated.text, "ok");
    assert_eq!(sleeper.recorded().len(), 1);
}
