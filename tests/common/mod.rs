//! Shared test helpers: scripted adapter, recording sleeper, sample tools.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use toolchat::error::ChatError;
use toolchat::provider::{
    Backend, ProviderAdapter, ProviderRequest, ProviderResponse, ResponsePart, ToolCallStyle,
};
use toolchat::tools::{FnTool, ToolArguments, ToolParameters};
use toolchat::types::{FinishReason, ToolCall, Usage};
use toolchat::util::retry::{RetryPolicy, Sleeper};

type Responder = dyn Fn(&ProviderRequest) -> Result<ProviderResponse, ChatError> + Send + Sync;

/// Adapter that answers from a queue, then from an optional responder.
pub struct ScriptedAdapter {
    style: ToolCallStyle,
    script: Mutex<VecDeque<Result<ProviderResponse, ChatError>>>,
    responder: Option<Box<Responder>>,
    pub requests: Arc<Mutex<Vec<ProviderRequest>>>,
    pub calls: AtomicUsize,
    hang_when_empty: bool,
}

impl ScriptedAdapter {
    pub fn new(style: ToolCallStyle) -> Self {
        Self {
            style,
            script: Mutex::new(VecDeque::new()),
            responder: None,
            requests: Arc::new(Mutex::new(Vec::new())),
            calls: AtomicUsize::new(0),
            hang_when_empty: false,
        }
    }

    /// Never answer once the script runs out.
    pub fn hanging_when_empty(mut self) -> Self {
        self.hang_when_empty = true;
        self
    }

    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&ProviderRequest) -> Result<ProviderResponse, ChatError> + Send + Sync + 'static,
    {
        self.responder = Some(Box::new(responder));
        self
    }

    pub fn queue(&self, response: Result<ProviderResponse, ChatError>) -> &Self {
        self.script.lock().unwrap().push_back(response);
        self
    }

    pub fn queue_text(&self, text: &str) -> &Self {
        self.queue(Ok(text_response(text)))
    }

    pub fn queue_tool_call(&self, id: &str, name: &str, args: serde_json::Value) -> &Self {
        self.queue(Ok(tool_call_response(vec![
            ToolCall::new(name, args).with_id(id)
        ])))
    }

    pub fn queue_error(&self, error: ChatError) -> &Self {
        self.queue(Err(error))
    }

    pub fn recorded(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn backend(&self) -> Backend {
        Backend::OpenAi
    }

    fn model_id(&self) -> &str {
        "scripted"
    }

    fn tool_call_style(&self) -> ToolCallStyle {
        self.style
    }

    async fn submit(&self, request: &ProviderRequest) -> Result<ProviderResponse, ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let queued = self.script.lock().unwrap().pop_front();
        if let Some(next) = queued {
            return next;
        }
        if self.hang_when_empty {
            futures::future::pending::<()>().await;
        }
        match &self.responder {
            Some(responder) => responder(request),
            None => Ok(text_response("Mock response")),
        }
    }
}

pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        parts: vec![ResponsePart::Text(text.to_string())],
        usage: Usage::new(10, 20),
        finish_reason: Some(FinishReason::Stop),
    }
}

pub fn tool_call_response(calls: Vec<ToolCall>) -> ProviderResponse {
    ProviderResponse {
        parts: calls.into_iter().map(ResponsePart::ToolCall).collect(),
        usage: Usage::new(10, 5),
        finish_reason: Some(FinishReason::ToolCalls),
    }
}

/// Sleeper that records requested delays and returns at once.
#[derive(Default)]
pub struct RecordingSleeper {
    pub delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn recorded(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.delays.lock().unwrap().push(duration);
    }
}

/// Default-shaped retry policy that never actually waits.
pub fn recorded_retry(max_attempts: u32) -> (RetryPolicy, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let policy = RetryPolicy::new(max_attempts, Duration::from_secs(1), Duration::from_secs(30))
        .with_sleeper(sleeper.clone());
    (policy, sleeper)
}

pub fn pwd_tool() -> FnTool {
    FnTool::new(
        "pwd",
        "Print the working directory",
        ToolParameters::empty(),
        |_args, _ctx| async { Ok(json!({"path": "/tmp"})) },
    )
}

/// Tool that counts invocations and records the arguments it saw.
pub fn recording_tool(
    name: &str,
    parameters: ToolParameters,
) -> (FnTool, Arc<AtomicUsize>, Arc<Mutex<Vec<ToolArguments>>>) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (count_in, seen_in) = (count.clone(), seen.clone());
    let tool = FnTool::new(name, "Records its calls", parameters, move |args, _ctx| {
        count_in.fetch_add(1, Ordering::SeqCst);
        seen_in.lock().unwrap().push(args.clone());
        async move { Ok(json!({"ok": true, "args": args.into_value()})) }
    });
    (tool, count, seen)
}

/// Tool that never finishes on its own.
pub fn hanging_tool(name: &str) -> FnTool {
    FnTool::new(name, "Never returns", ToolParameters::empty(), |_args, _ctx| async {
        futures::future::pending::<()>().await;
        Ok(json!(null))
    })
}

/// Tool that sleeps for `millis` then returns its label.
pub fn slow_tool(name: &str, millis: u64) -> FnTool {
    let label = name.to_string();
    FnTool::new(name, "Sleeps", ToolParameters::empty(), move |_args, _ctx| {
        let label = label.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok(json!(label))
        }
    })
}
