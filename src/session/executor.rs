//! Executes the tool calls of one model answer.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ChatError;
use crate::generation::generate;
use crate::provider::ProviderAdapter;
use crate::tools::{validate_arguments, ToolArguments, ToolContext, ToolRegistry};
use crate::types::{GenerationSettings, Message, ToolCall, ToolResult, Usage};
use crate::util::retry::RetryPolicy;
use crate::util::timeout::with_deadline;

type CallFuture<'a> =
    Pin<Box<dyn Future<Output = Result<(ToolResult, Usage), ChatError>> + Send + 'a>>;

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(300);

/// Side request that compresses the output of tools flagged `summarize`.
#[derive(Clone)]
pub struct Summarizer {
    pub adapter: Arc<dyn ProviderAdapter>,
    pub retry: RetryPolicy,
    pub settings: GenerationSettings,
    pub words: u32,
}

impl Summarizer {
    fn prompt(&self, content: &str) -> String {
        format!(
            "Summarize these tool results in {words} words or less. Your summarization must be shorter than the provided value\n\
             If there appears to be an error, just return the error with no additional information\n\
             Do not provide any reference to the word count or the fact that you summarized. Simply return your content.\n\n{content}",
            words = self.words
        )
    }
}

/// Tool-result messages of one round, in call order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutedRound {
    pub messages: Vec<Message>,
    /// Usage spent on summarization side requests.
    pub usage: Usage,
    /// Calls actually run.
    pub executed: usize,
    /// Calls answered with an earlier identical call's result.
    pub duplicates: usize,
}

/// Resolves, validates and runs tool calls.
///
/// Identical calls (same name and arguments) within one round run once and
/// every copy receives the same result, keeping one tool message per call.
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
    concurrency: usize,
    summarizer: Option<Summarizer>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: DEFAULT_TOOL_TIMEOUT,
            concurrency: 1,
            summarizer: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run up to `concurrency` calls at a time. Results keep call order.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Summarizer) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute `calls` and return one tool message per call.
    ///
    /// Tool failures become `error: ...` messages. Only cancellation aborts
    /// the round.
    pub async fn execute_round(
        &self,
        calls: &[ToolCall],
        cancel: &CancellationToken,
    ) -> Result<ExecutedRound, ChatError> {
        let mut first_by_hash: HashMap<String, usize> = HashMap::new();
        let mut unique: Vec<usize> = Vec::new();
        let mut slot_of: Vec<usize> = Vec::with_capacity(calls.len());

        for (index, call) in calls.iter().enumerate() {
            let hash = call_hash(call);
            match first_by_hash.get(&hash) {
                Some(&slot) => {
                    debug!(tool = %call.name, "Skipping duplicate tool call");
                    slot_of.push(slot);
                }
                None => {
                    let slot = unique.len();
                    first_by_hash.insert(hash, slot);
                    unique.push(index);
                    slot_of.push(slot);
                }
            }
        }

        // Boxed up front so the session task future stays `Send`.
        let pending: Vec<CallFuture<'_>> = unique
            .iter()
            .map(|&index| Box::pin(self.run_call(&calls[index], cancel)) as CallFuture<'_>)
            .collect();
        let outcomes: Vec<Result<(ToolResult, Usage), ChatError>> = stream::iter(pending)
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut results = Vec::with_capacity(outcomes.len());
        let mut usage = Usage::default();
        for outcome in outcomes {
            let (result, spent) = outcome?;
            usage.merge(&spent);
            results.push(result);
        }

        let messages = calls
            .iter()
            .zip(&slot_of)
            .map(|(call, &slot)| results[slot].clone().into_message(call))
            .collect();

        Ok(ExecutedRound {
            messages,
            usage,
            executed: unique.len(),
            duplicates: calls.len() - unique.len(),
        })
    }

    async fn run_call(
        &self,
        call: &ToolCall,
        cancel: &CancellationToken,
    ) -> Result<(ToolResult, Usage), ChatError> {
        let tool = match self.registry.resolve(&call.name) {
            Ok(tool) => tool,
            Err(e) => {
                warn!(tool = %call.name, "Model called an unknown tool");
                return Ok((ToolResult::failure(e.to_string()), Usage::default()));
            }
        };

        let args = ToolArguments::with_bound(&call.arguments, &tool.bound_arguments());
        if let Err(reason) = validate_arguments(args.raw(), &tool.parameters().schema) {
            warn!(tool = %call.name, %reason, "Rejected tool arguments");
            return Ok((
                ToolResult::failure(format!("invalid arguments for tool {}: {reason}", call.name)),
                Usage::default(),
            ));
        }

        let call_cancel = cancel.child_token();
        let ctx = ToolContext {
            call_id: call.id.clone(),
            cancel: call_cancel.clone(),
        };
        let started = Instant::now();
        let outcome = with_deadline(self.timeout, cancel, tool.execute(&args, &ctx)).await;
        call_cancel.cancel();

        let result = match outcome {
            Ok(value) => {
                debug!(
                    tool = %call.name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Tool finished"
                );
                ToolResult::success(value)
            }
            Err(_) if cancel.is_cancelled() => return Err(ChatError::Cancelled),
            Err(ChatError::Timeout(ms)) => {
                warn!(tool = %call.name, timeout_ms = ms, "Tool timed out");
                ToolResult::failure(format!("tool {} timed out after {ms}ms", call.name))
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool failed");
                ToolResult::failure(e.to_string())
            }
        };

        if !(result.success && tool.summarize()) {
            return Ok((result, Usage::default()));
        }
        match &self.summarizer {
            Some(summarizer) => self.summarize(summarizer, call, result, cancel).await,
            None => Ok((result, Usage::default())),
        }
    }

    async fn summarize(
        &self,
        summarizer: &Summarizer,
        call: &ToolCall,
        result: ToolResult,
        cancel: &CancellationToken,
    ) -> Result<(ToolResult, Usage), ChatError> {
        let prompt = summarizer.prompt(&result.to_content());
        let settings = summarizer.settings.with_max_tokens(summarizer.words);
        let generated = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChatError::Cancelled),
            generated = generate(
                summarizer.adapter.as_ref(),
                &summarizer.retry,
                None,
                &prompt,
                &settings,
            ) => generated,
        };

        match generated {
            Ok(summary) => {
                debug!(tool = %call.name, "Summarized tool output");
                Ok((
                    ToolResult::success(serde_json::Value::String(summary.text)),
                    summary.usage,
                ))
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Summarization failed, keeping raw output");
                Ok((result, Usage::default()))
            }
        }
    }
}

/// SHA-256 over the canonical `{name, arguments}` form of a call.
pub fn call_hash(call: &ToolCall) -> String {
    let canonical = canonical_json(&serde_json::json!({
        "name": call.name,
        "arguments": call.arguments,
    }));
    let digest = Sha256::digest(canonical.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Serialize with object keys sorted at every level.
pub fn canonical_json(value: &serde_json::Value) -> String {
    fn sorted(value: &serde_json::Value) -> serde_json::Value {
        match value {
            serde_json::Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                let mut out = serde_json::Map::new();
                for key in keys {
                    out.insert(key.clone(), sorted(&map[key]));
                }
                serde_json::Value::Object(out)
            }
            serde_json::Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(sorted).collect())
            }
            other => other.clone(),
        }
    }
    sorted(value).to_string()
}
