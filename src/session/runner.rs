//! The per-round dispatch loop.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ChatError;
use crate::extract::{Extraction, ToolCallExtractor};
use crate::provider::{ProviderAdapter, ProviderRequest, ResponsePart, ToolCallStyle};
use crate::types::{GenerationSettings, Message, ToolCall, Usage};
use crate::util::retry::RetryPolicy;

use super::compaction::ContextCompactor;
use super::conversation::ConversationState;
use super::executor::ToolExecutor;
use super::state::{SessionState, StateMachine};
use super::SessionEvent;

/// Corrective message for backends that write `<tool_call>` markup instead
/// of using typed calls.
pub const INVALID_TOOL_MARKUP: &str = "Error: Invalid tool call format detected. Please use the proper tool calling mechanism instead of embedding tool calls in text.";

pub(crate) struct Runner {
    pub adapter: Arc<dyn ProviderAdapter>,
    pub executor: ToolExecutor,
    pub compactor: ContextCompactor,
    pub extractor: Arc<dyn ToolCallExtractor>,
    pub retry: RetryPolicy,
    pub settings: GenerationSettings,
    pub machine: StateMachine,
    pub cancel: CancellationToken,
    /// Usage of the round in progress, readable after a failure.
    pub round_usage: Usage,
}

/// What the model answered on one dispatch, after interpretation.
enum Step {
    Reply(String),
    Tools { calls: Vec<ToolCall> },
    Redispatch,
}

impl Runner {
    /// Run one caller message to completion on `conversation`.
    ///
    /// Interim text is emitted as it arrives. On error the caller discards
    /// `conversation`.
    pub async fn run_round(
        &mut self,
        conversation: &mut ConversationState,
        text: String,
        events: &mpsc::Sender<SessionEvent>,
    ) -> Result<(), ChatError> {
        self.round_usage = Usage::default();
        conversation.begin_round(text);
        self.machine.transition(SessionState::Dispatching)?;

        loop {
            if let Some(compacted) = self
                .compactor
                .compact(
                    &conversation.transcript,
                    self.adapter.as_ref(),
                    &self.retry,
                    &self.settings,
                )
                .await?
            {
                self.round_usage.merge(&compacted.usage);
                conversation.transcript = compacted.transcript;
            }

            let final_turn = conversation.begin_turn();
            let tools = if final_turn {
                debug!(turns = conversation.turn_count, "Turn limit reached, requesting final answer");
                Vec::new()
            } else {
                self.executor.registry().declarations()
            };

            self.machine.transition(SessionState::AwaitingModel)?;
            let request =
                ProviderRequest::new(conversation.transcript.clone(), self.settings.clone())
                    .with_tools(tools);
            let adapter = self.adapter.as_ref();
            let response = self.retry.execute(|| adapter.submit(&request)).await?;
            self.round_usage.merge(&response.usage);

            let mut text = String::new();
            let mut calls = Vec::new();
            for part in response.parts {
                match part {
                    ResponsePart::Text(t) => text.push_str(&t),
                    ResponsePart::ToolCall(call) => calls.push(call),
                    ResponsePart::Unrecognized(kind) => {
                        return Err(ChatError::UnrecognizedResponse(kind))
                    }
                }
            }

            if final_turn {
                if !calls.is_empty() {
                    warn!(calls = calls.len(), "Dropping tool calls past the turn limit");
                }
                return self.finish(conversation, text, events).await;
            }

            match self.interpret(conversation, text, calls, events).await {
                Step::Reply(text) => return self.finish(conversation, text, events).await,
                Step::Redispatch => {
                    self.machine.transition(SessionState::Dispatching)?;
                }
                Step::Tools { calls } => {
                    self.machine.transition(SessionState::ExecutingTools)?;
                    let executed = self.executor.execute_round(&calls, &self.cancel).await?;
                    debug!(
                        executed = executed.executed,
                        duplicates = executed.duplicates,
                        "Tool round complete"
                    );
                    self.round_usage.merge(&executed.usage);
                    conversation.transcript.extend(executed.messages);
                    self.machine.transition(SessionState::Dispatching)?;
                }
            }
        }
    }

    /// Decide what an answer means and record the assistant side of it.
    async fn interpret(
        &self,
        conversation: &mut ConversationState,
        text: String,
        calls: Vec<ToolCall>,
        events: &mpsc::Sender<SessionEvent>,
    ) -> Step {
        if !calls.is_empty() {
            if !text.trim().is_empty() {
                emit(events, &self.cancel, SessionEvent::Reply(text.clone())).await;
            }
            conversation
                .transcript
                .push(Message::assistant_with_tool_calls(text, calls.clone()));
            return Step::Tools { calls };
        }

        match self.adapter.tool_call_style() {
            ToolCallStyle::TextEmbedded => match self.extractor.extract(&text) {
                Extraction::PlainText(text) => Step::Reply(text),
                Extraction::ToolCall {
                    call,
                    preamble,
                    repaired,
                } => {
                    debug!(tool = %call.name, repaired, "Extracted tool call from text");
                    if let Some(preamble) = preamble {
                        emit(events, &self.cancel, SessionEvent::Reply(preamble)).await;
                    }
                    conversation
                        .transcript
                        .push(Message::assistant_with_tool_calls(text, vec![call.clone()]));
                    Step::Tools { calls: vec![call] }
                }
                Extraction::Malformed { error, .. } => {
                    warn!(%error, "Model produced an undecodable tool call");
                    conversation.transcript.push(Message::assistant(text));
                    conversation.transcript.push(Message::tool_error(format!(
                        "error: you provided an invalid tool call: {error}"
                    )));
                    Step::Redispatch
                }
            },
            ToolCallStyle::TypedWithHistoryReplay if text.contains("<tool_call>") => {
                warn!("Model wrote tool call markup instead of a typed call");
                conversation.transcript.push(Message::assistant(text));
                conversation.transcript.push(Message::user(INVALID_TOOL_MARKUP));
                Step::Redispatch
            }
            ToolCallStyle::Typed | ToolCallStyle::TypedWithHistoryReplay => Step::Reply(text),
        }
    }

    async fn finish(
        &mut self,
        conversation: &mut ConversationState,
        text: String,
        events: &mpsc::Sender<SessionEvent>,
    ) -> Result<(), ChatError> {
        conversation.transcript.push(Message::assistant(text.clone()));
        emit(events, &self.cancel, SessionEvent::Reply(text)).await;
        self.machine.transition(SessionState::AwaitingInput)
    }
}

/// Deliver an event unless the session is shutting down or nobody listens.
pub(crate) async fn emit(
    events: &mpsc::Sender<SessionEvent>,
    cancel: &CancellationToken,
    event: SessionEvent,
) {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {}
        _ = events.send(event) => {}
    }
}
