//! Message types for model communication.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message in a conversation transcript.
///
/// Transcript order is conversation order and is replayed verbatim to the
/// backend on every turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// Calls requested by the model. Empty unless `role` is assistant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Correlation id echoed from the call this tool result answers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Tool name on tool-role messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    /// Create an assistant message carrying tool calls.
    pub fn assistant_with_tool_calls(text: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        let mut message = Self::new(Role::Assistant, text);
        message.tool_calls = calls;
        message
    }

    /// Create a tool result message answering `call`.
    pub fn tool_result(call: &ToolCall, content: impl Into<String>) -> Self {
        let mut message = Self::new(Role::Tool, content);
        message.tool_call_id = call.id.clone();
        message.name = Some(call.name.clone());
        message
    }

    /// Create a tool-role error message that answers no particular call.
    pub fn tool_error(content: impl Into<String>) -> Self {
        Self::new(Role::Tool, content)
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    /// Backend-assigned correlation id. Absent for text-embedded calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub arguments: serde_json::Value,
    /// Argument text exactly as the backend sent it, for verbatim replay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_arguments: Option<String>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
            raw_arguments: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Build a call from an argument string, keeping the raw text.
    ///
    /// Unparseable arguments are kept as a JSON string value.
    pub fn from_raw_arguments(name: impl Into<String>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let arguments = if raw.trim().is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(&raw).unwrap_or_else(|_| serde_json::Value::String(raw.clone()))
        };
        Self {
            id: None,
            name: name.into(),
            arguments,
            raw_arguments: Some(raw),
        }
    }

    /// Argument text to send back to the backend when replaying history.
    pub fn arguments_text(&self) -> String {
        match (&self.raw_arguments, &self.arguments) {
            (Some(raw), _) => raw.clone(),
            (None, serde_json::Value::String(s)) => s.clone(),
            (None, value) => value.to_string(),
        }
    }
}

/// Outcome of one tool execution, folded into a tool-role message.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub success: bool,
    pub value: serde_json::Value,
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(value: serde_json::Value) -> Self {
        Self {
            success: true,
            value,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            value: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }

    /// Render the result as tool-message content.
    pub fn to_content(&self) -> String {
        if !self.success {
            let reason = self.error.as_deref().unwrap_or("tool failed");
            return format!("error: {reason}");
        }
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            value => value.to_string(),
        }
    }

    /// Fold this result into a tool-role message answering `call`.
    pub fn into_message(self, call: &ToolCall) -> Message {
        Message::tool_result(call, self.to_content())
    }
}
