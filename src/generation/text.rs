//! Single-shot text generation without tools.

use tracing::{debug, warn};

use crate::error::ChatError;
use crate::provider::{ProviderAdapter, ProviderRequest, ResponsePart};
use crate::types::{GenerationSettings, Message, Usage};
use crate::util::retry::RetryPolicy;

/// Text produced by [`generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedText {
    pub text: String,
    pub usage: Usage,
}

/// Send `prompt` (after an optional system message) with no tool declarations
/// through the retry policy and return the text answer.
pub async fn generate(
    adapter: &dyn ProviderAdapter,
    retry: &RetryPolicy,
    system: Option<&str>,
    prompt: &str,
    settings: &GenerationSettings,
) -> Result<GeneratedText, ChatError> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(prompt));
    let request = ProviderRequest::new(messages, settings.clone());

    debug!(model = adapter.model_id(), prompt_chars = prompt.len(), "generate");
    let response = retry.execute(|| adapter.submit(&request)).await?;

    let mut text = String::new();
    for part in response.parts {
        match part {
            ResponsePart::Text(t) => text.push_str(&t),
            ResponsePart::ToolCall(call) => {
                warn!(tool = %call.name, "Ignoring tool call in tool-less generation");
            }
            ResponsePart::Unrecognized(kind) => return Err(ChatError::UnrecognizedResponse(kind)),
        }
    }

    Ok(GeneratedText {
        text,
        usage: response.usage,
    })
}
