//! Locating and decoding tool calls embedded in free-form model text.

pub mod repair;

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::types::ToolCall;

pub use repair::repair_unescaped_quotes;

static TOOL_CALL_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\s*"name"\s*:\s*"[^"]*"\s*,\s*"arguments"\s*:"#)
        .expect("tool call pattern must compile")
});

/// Outcome of scanning assistant text for an embedded tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// No tool call found; the text is the answer.
    PlainText(String),
    /// A decodable tool call.
    ToolCall {
        call: ToolCall,
        /// Prose the model wrote before the call, if any.
        preamble: Option<String>,
        /// Whether quote repair was needed to decode the call.
        repaired: bool,
    },
    /// Something shaped like a tool call that could not be decoded.
    Malformed { candidate: String, error: String },
}

/// Finds tool calls in assistant text for backends without typed calls.
pub trait ToolCallExtractor: Send + Sync {
    fn extract(&self, text: &str) -> Extraction;
}

/// Pattern-based extractor for `{"name": ..., "arguments": ...}` objects.
///
/// Tolerates surrounding code fences and `<tool_call>` tags, and retries the
/// decode once after [`repair_unescaped_quotes`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternToolCallExtractor;

#[derive(Deserialize)]
struct EmbeddedCall {
    name: String,
    #[serde(default)]
    arguments: serde_json::Value,
}

impl ToolCallExtractor for PatternToolCallExtractor {
    fn extract(&self, text: &str) -> Extraction {
        let Some(found) = TOOL_CALL_START.find(text) else {
            return Extraction::PlainText(text.to_string());
        };

        let candidate = strip_wrappers(&text[found.start()..]);
        let preamble = Some(strip_wrappers(&text[..found.start()])).filter(|p| !p.is_empty());

        match decode_call(&candidate) {
            Ok(call) => Extraction::ToolCall {
                call,
                preamble,
                repaired: false,
            },
            Err(first_error) => {
                let repaired = repair_unescaped_quotes(&candidate);
                match decode_call(&repaired) {
                    Ok(call) => {
                        tracing::debug!(tool = %call.name, "Decoded tool call after quote repair");
                        Extraction::ToolCall {
                            call,
                            preamble,
                            repaired: true,
                        }
                    }
                    Err(_) => Extraction::Malformed {
                        candidate,
                        error: first_error.to_string(),
                    },
                }
            }
        }
    }
}

fn strip_wrappers(text: &str) -> String {
    let mut cleaned = text.replace("```json", "").replace("```", "");
    for tag in ["<tool_call>", "</tool_call>"] {
        cleaned = cleaned.replace(tag, "");
    }
    cleaned.trim().to_string()
}

/// Decode the first JSON value of `candidate`, ignoring trailing prose.
fn decode_call(candidate: &str) -> Result<ToolCall, serde_json::Error> {
    let mut stream = serde_json::Deserializer::from_str(candidate).into_iter::<EmbeddedCall>();
    let embedded = match stream.next() {
        Some(result) => result?,
        None => serde_json::from_str::<EmbeddedCall>(candidate)?,
    };

    let arguments = match embedded.arguments {
        serde_json::Value::Null => serde_json::json!({}),
        serde_json::Value::String(s) => {
            serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s))
        }
        other => other,
    };
    Ok(ToolCall::new(embedded.name, arguments))
}
