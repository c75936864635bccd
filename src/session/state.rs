//! Session lifecycle states and their legal transitions.

use strum::Display;
use tokio::sync::watch;

use crate::error::ChatError;

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    /// Constructed, task not yet running.
    Idle,
    /// Waiting for the caller's next message.
    AwaitingInput,
    /// Preparing the next request (compaction, turn accounting).
    Dispatching,
    /// A backend exchange is in flight, retries included.
    AwaitingModel,
    /// Running the tool calls of the last answer.
    ExecutingTools,
    /// Terminal.
    Closed,
}

impl SessionState {
    /// Whether `self -> next` is a legal step.
    ///
    /// Any state may close. Dispatching, AwaitingModel and ExecutingTools may
    /// fall back to AwaitingInput when a round fails.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Idle, AwaitingInput | Dispatching) => true,
            (AwaitingInput, Dispatching) => true,
            (Dispatching, AwaitingModel | AwaitingInput) => true,
            (AwaitingModel, ExecutingTools | Dispatching | AwaitingInput) => true,
            (ExecutingTools, Dispatching | AwaitingInput) => true,
            _ => false,
        }
    }
}

/// Tracks the current state and publishes it on a watch channel.
#[derive(Debug)]
pub struct StateMachine {
    current: SessionState,
    tx: watch::Sender<SessionState>,
}

impl StateMachine {
    pub fn new() -> (Self, watch::Receiver<SessionState>) {
        let (tx, rx) = watch::channel(SessionState::Idle);
        (
            Self {
                current: SessionState::Idle,
                tx,
            },
            rx,
        )
    }

    pub fn current(&self) -> SessionState {
        self.current
    }

    pub fn transition(&mut self, next: SessionState) -> Result<(), ChatError> {
        if !self.current.can_transition_to(next) {
            return Err(ChatError::InvalidState(format!(
                "illegal transition {} -> {next}",
                self.current
            )));
        }
        tracing::trace!(from = %self.current, to = %next, "Session transition");
        self.current = next;
        self.tx.send_replace(next);
        Ok(())
    }

    /// Return to AwaitingInput after a failed round. No-op once closed.
    pub fn recover(&mut self) {
        if self.current != SessionState::AwaitingInput
            && self.current.can_transition_to(SessionState::AwaitingInput)
        {
            let _ = self.transition(SessionState::AwaitingInput);
        }
    }

    pub fn close(&mut self) {
        if self.current != SessionState::Closed {
            let _ = self.transition(SessionState::Closed);
        }
    }
}
