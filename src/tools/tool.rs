//! Tool trait and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::arguments::ToolArguments;
use super::types::{ToolDeclaration, ToolParameters};
use crate::error::ChatError;

/// Context available during tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Correlation id of the call being answered, when the backend sent one.
    pub call_id: Option<String>,
    /// Fires when the call times out or the session shuts down.
    pub cancel: CancellationToken,
}

/// An externally invokable tool the model may call.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> &ToolParameters;

    /// Whether successful output should be compressed by the model before
    /// it enters the transcript.
    fn summarize(&self) -> bool {
        false
    }

    /// Fixed arguments merged over whatever the model supplies.
    fn bound_arguments(&self) -> serde_json::Map<String, serde_json::Value> {
        serde_json::Map::new()
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, ChatError>;

    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters().schema.clone(),
        }
    }
}

type ToolHandler = dyn Fn(
        ToolArguments,
        ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, ChatError>> + Send>>
    + Send
    + Sync;

/// Closure-backed tool.
#[derive(Clone)]
pub struct FnTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    summarize: bool,
    bound: serde_json::Map<String, serde_json::Value>,
    handler: Arc<ToolHandler>,
}

impl FnTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, ChatError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            summarize: false,
            bound: serde_json::Map::new(),
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }

    /// Ask the model to compress this tool's output.
    pub fn summarized(mut self) -> Self {
        self.summarize = true;
        self
    }

    /// Bind a fixed argument value.
    pub fn bind(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.bound.insert(key.into(), value);
        self
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    fn summarize(&self) -> bool {
        self.summarize
    }

    fn bound_arguments(&self) -> serde_json::Map<String, serde_json::Value> {
        self.bound.clone()
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, ChatError> {
        (self.handler)(args.clone(), ctx.clone()).await
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("summarize", &self.summarize)
            .field("bound", &self.bound)
            .finish_non_exhaustive()
    }
}
