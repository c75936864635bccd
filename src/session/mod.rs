//! Conversation sessions: one task per conversation, driven through channels.

pub mod compaction;
pub mod conversation;
pub mod executor;
pub mod runner;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::ChatConfig;
use crate::error::ChatError;
use crate::extract::{PatternToolCallExtractor, ToolCallExtractor};
use crate::provider::{create_adapter, ProviderAdapter};
use crate::tools::ToolRegistry;
use crate::types::{GenerationSettings, Message, Usage};
use crate::util::retry::RetryPolicy;

pub use compaction::{ContextCompactor, HeuristicTokenCounter, TokenCounter};
pub use conversation::ConversationState;
pub use executor::{ExecutedRound, Summarizer, ToolExecutor};
pub use state::SessionState;

use runner::{emit, Runner};

/// Something the session tells its caller.
#[derive(Debug)]
pub enum SessionEvent {
    /// Text from the model. Interim text written alongside tool calls is
    /// delivered too, before the final answer.
    Reply(String),
    /// The round failed. The transcript is as it was before the `send`.
    Failed(ChatError),
    /// Exactly one per `send`, after every other event of the round.
    RoundComplete { turns: u32, usage: Usage },
}

/// Caller side of a session without the event receiver.
///
/// Dropping it cancels the session task.
#[derive(Debug)]
pub struct SessionHandle {
    id: Uuid,
    input: mpsc::Sender<String>,
    state: watch::Receiver<SessionState>,
    cancel: CancellationToken,
    _guard: DropGuard,
    task: JoinHandle<Vec<Message>>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queue a user message. Waits while the input queue is full.
    pub async fn send(&self, text: impl Into<String>) -> Result<(), ChatError> {
        if self.cancel.is_cancelled() {
            return Err(ChatError::SessionClosed);
        }
        self.input
            .send(text.into())
            .await
            .map_err(|_| ChatError::SessionClosed)
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Subscribe to state changes.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    /// Stop the session and return its final transcript.
    ///
    /// A round in flight is abandoned and does not reach the transcript.
    pub async fn close(self) -> Result<Vec<Message>, ChatError> {
        self.cancel.cancel();
        self.task
            .await
            .map_err(|e| ChatError::InvalidState(format!("session task failed: {e}")))
    }
}

/// A running conversation.
#[derive(Debug)]
pub struct ChatSession {
    handle: SessionHandle,
    events: mpsc::Receiver<SessionEvent>,
}

impl ChatSession {
    pub fn builder(adapter: Arc<dyn ProviderAdapter>) -> ChatSessionBuilder {
        ChatSessionBuilder::new(adapter)
    }

    /// Build the adapter and session described by `config`.
    pub fn from_config(config: &ChatConfig, registry: Arc<ToolRegistry>) -> Result<Self, ChatError> {
        let adapter = create_adapter(config)?;
        let mut builder = ChatSessionBuilder::new(adapter)
            .tools(registry)
            .settings(config.generation.clone())
            .max_turns(config.max_turns)
            .retry(config.retry.policy())
            .tool_timeout(config.tool_timeout())
            .tool_concurrency(config.tools.concurrency)
            .summary_words(config.tools.summary_words)
            .context_budget(config.context_budget_tokens())
            .compaction_words(config.compaction.summary_words)
            .include_system_in_budget(config.compaction.include_system)
            .channel_capacity(config.channel_capacity);
        if let Some(prompt) = &config.system_prompt {
            builder = builder.system_prompt(prompt.clone());
        }
        Ok(builder.spawn())
    }

    pub fn id(&self) -> Uuid {
        self.handle.id()
    }

    pub async fn send(&self, text: impl Into<String>) -> Result<(), ChatError> {
        self.handle.send(text).await
    }

    /// Next event, or `None` once the session has shut down.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    /// Send `text` and wait for the round to finish, returning the final
    /// reply.
    pub async fn ask(&mut self, text: impl Into<String>) -> Result<String, ChatError> {
        self.send(text).await?;
        let mut last_reply = None;
        let mut failure = None;
        while let Some(event) = self.recv().await {
            match event {
                SessionEvent::Reply(text) => last_reply = Some(text),
                SessionEvent::Failed(e) => failure = Some(e),
                SessionEvent::RoundComplete { .. } => {
                    return match failure {
                        Some(e) => Err(e),
                        None => Ok(last_reply.unwrap_or_default()),
                    };
                }
            }
        }
        Err(failure.unwrap_or(ChatError::SessionClosed))
    }

    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.handle.watch_state()
    }

    pub async fn close(self) -> Result<Vec<Message>, ChatError> {
        self.handle.close().await
    }

    /// Separate the sending half from the event stream.
    pub fn split(self) -> (SessionHandle, ReceiverStream<SessionEvent>) {
        (self.handle, ReceiverStream::new(self.events))
    }
}

/// Configures and spawns a [`ChatSession`].
pub struct ChatSessionBuilder {
    adapter: Arc<dyn ProviderAdapter>,
    registry: Arc<ToolRegistry>,
    system_prompt: Option<String>,
    settings: GenerationSettings,
    max_turns: u32,
    retry: RetryPolicy,
    tool_timeout: Duration,
    tool_concurrency: usize,
    summary_words: u32,
    context_budget: u32,
    compaction_words: u32,
    include_system_in_budget: bool,
    token_counter: Option<Arc<dyn TokenCounter>>,
    extractor: Arc<dyn ToolCallExtractor>,
    channel_capacity: usize,
}

impl ChatSessionBuilder {
    pub fn new(adapter: Arc<dyn ProviderAdapter>) -> Self {
        Self {
            adapter,
            registry: Arc::new(ToolRegistry::new()),
            system_prompt: None,
            settings: GenerationSettings::default(),
            max_turns: 0,
            retry: RetryPolicy::default(),
            tool_timeout: executor::DEFAULT_TOOL_TIMEOUT,
            tool_concurrency: 1,
            summary_words: 5000,
            context_budget: 0,
            compaction_words: 5000,
            include_system_in_budget: true,
            token_counter: None,
            extractor: Arc::new(PatternToolCallExtractor),
            channel_capacity: 32,
        }
    }

    pub fn tools(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Tool rounds per `send` before a final no-tools request. 0 = unbounded.
    pub fn max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn tool_concurrency(mut self, concurrency: usize) -> Self {
        self.tool_concurrency = concurrency;
        self
    }

    pub fn summary_words(mut self, words: u32) -> Self {
        self.summary_words = words;
        self
    }

    /// Transcript token budget that triggers compaction. 0 disables it.
    pub fn context_budget(mut self, tokens: u32) -> Self {
        self.context_budget = tokens;
        self
    }

    pub fn compaction_words(mut self, words: u32) -> Self {
        self.compaction_words = words;
        self
    }

    pub fn include_system_in_budget(mut self, include: bool) -> Self {
        self.include_system_in_budget = include;
        self
    }

    pub fn token_counter(mut self, counter: Arc<dyn TokenCounter>) -> Self {
        self.token_counter = Some(counter);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn ToolCallExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Start the session task. Must be called inside a tokio runtime.
    pub fn spawn(self) -> ChatSession {
        let id = Uuid::new_v4();
        let cancel = CancellationToken::new();
        let (input_tx, input_rx) = mpsc::channel(self.channel_capacity);
        let (events_tx, events_rx) = mpsc::channel(self.channel_capacity);
        let (machine, state_rx) = state::StateMachine::new();

        let executor = ToolExecutor::new(self.registry)
            .with_timeout(self.tool_timeout)
            .with_concurrency(self.tool_concurrency)
            .with_summarizer(Summarizer {
                adapter: self.adapter.clone(),
                retry: self.retry.clone(),
                settings: self.settings.clone(),
                words: self.summary_words,
            });

        let mut compactor = ContextCompactor::new(self.context_budget)
            .with_include_system(self.include_system_in_budget)
            .with_summary_words(self.compaction_words);
        if let Some(counter) = self.token_counter {
            compactor = compactor.with_counter(counter);
        }

        let conversation = ConversationState::new(
            self.system_prompt.as_deref(),
            self.max_turns,
            self.context_budget,
        );

        let runner = Runner {
            adapter: self.adapter,
            executor,
            compactor,
            extractor: self.extractor,
            retry: self.retry,
            settings: self.settings,
            machine,
            cancel: cancel.clone(),
            round_usage: Usage::default(),
        };

        let span = tracing::info_span!("chat_session", session_id = %id);
        let task = tokio::spawn(run_session(runner, conversation, input_rx, events_tx).instrument(span));

        ChatSession {
            handle: SessionHandle {
                id,
                input: input_tx,
                state: state_rx,
                cancel: cancel.clone(),
                _guard: cancel.drop_guard(),
                task,
            },
            events: events_rx,
        }
    }
}

async fn run_session(
    mut runner: Runner,
    mut conversation: ConversationState,
    mut input: mpsc::Receiver<String>,
    events: mpsc::Sender<SessionEvent>,
) -> Vec<Message> {
    let cancel = runner.cancel.clone();
    let _ = runner.machine.transition(SessionState::AwaitingInput);
    tracing::debug!(model = runner.adapter.model_id(), "Session started");

    loop {
        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = input.recv() => match next {
                Some(text) => text,
                None => break,
            },
        };

        let mut working = conversation.clone();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = runner.run_round(&mut working, text, &events) => Some(result),
        };

        let Some(result) = outcome else {
            tracing::debug!("Round abandoned by cancellation");
            break;
        };

        let turns = working.turn_count;
        match result {
            Ok(()) => conversation = working,
            Err(e) => {
                tracing::warn!(error = %e, "Round failed, transcript rolled back");
                runner.machine.recover();
                emit(&events, &cancel, SessionEvent::Failed(e)).await;
            }
        }
        emit(
            &events,
            &cancel,
            SessionEvent::RoundComplete {
                turns,
                usage: runner.round_usage,
            },
        )
        .await;
    }

    runner.machine.close();
    tracing::debug!(messages = conversation.transcript.len(), "Session closed");
    conversation.transcript
}
