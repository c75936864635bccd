//! Convenience re-exports for common use.

pub use crate::config::ChatConfig;
pub use crate::error::{ChatError, Result};
pub use crate::provider::{
    create_adapter, Backend, ProviderAdapter, ProviderRequest, ProviderResponse, ResponsePart,
    ToolCallStyle,
};
pub use crate::session::{ChatSession, SessionEvent, SessionState};
pub use crate::tools::{FnTool, Tool, ToolArguments, ToolContext, ToolParameters, ToolRegistry};
pub use crate::types::{FinishReason, GenerationSettings, Message, Role, ToolCall, Usage};
pub use crate::util::retry::RetryPolicy;
