//! Deadline and cancellation helper.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::ChatError;

/// Run a future until it finishes, the deadline passes, or `cancel` fires.
pub async fn with_deadline<T>(
    duration: Duration,
    cancel: &CancellationToken,
    future: impl Future<Output = Result<T, ChatError>>,
) -> Result<T, ChatError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ChatError::Cancelled),
        outcome = tokio::time::timeout(duration, future) => match outcome {
            Ok(result) => result,
            Err(_) => Err(ChatError::Timeout(duration.as_millis() as u64)),
        },
    }
}
