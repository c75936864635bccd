//! Error types for toolchat.

pub mod unified;

pub use unified::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all toolchat operations.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Unsupported backend: {0}")]
    UnsupportedBackend(String),

    #[error("Unrecognized response part: {0}")]
    UnrecognizedResponse(String),

    #[error("Malformed tool call: {0}")]
    MalformedToolCall(String),

    #[error("Tool {0} does not exist")]
    ToolNotFound(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Failed to get response after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<ChatError>,
    },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Session closed")]
    SessionClosed,

    #[error("Operation cancelled")]
    Cancelled,
}

impl ChatError {
    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(e) if e.is_decode() => ErrorCategory::Protocol,
            Self::Network(e) if e.is_builder() => ErrorCategory::Configuration,
            Self::Unavailable(_) | Self::Timeout(_) | Self::Network(_) => {
                ErrorCategory::Unavailable
            }
            Self::Configuration(_) | Self::ConfigParse(_) | Self::UnsupportedBackend(_) => {
                ErrorCategory::Configuration
            }
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                400 | 422 => ErrorCategory::BadRequest,
                401 | 403 => ErrorCategory::Authentication,
                408 | 500..=599 => ErrorCategory::Unavailable,
                429 => ErrorCategory::RateLimit,
                _ => ErrorCategory::Api,
            },
            Self::UnrecognizedResponse(_) | Self::MalformedToolCall(_) => ErrorCategory::Protocol,
            Self::ToolNotFound(_) | Self::ToolExecution { .. } | Self::InvalidArgument(_) => {
                ErrorCategory::ToolExecution
            }
            Self::RetriesExhausted { source, .. } => source.category(),
            Self::InvalidState(_) | Self::SessionClosed | Self::Cancelled => ErrorCategory::Session,
            Self::Io(_) => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is transient (rate limited or temporarily unavailable).
    ///
    /// Exhausted retries are never retryable again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::RetriesExhausted { .. })
            && matches!(
                self.category(),
                ErrorCategory::RateLimit | ErrorCategory::Unavailable
            )
    }

    /// Server-provided retry hint, if any.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited { retry_after_ms } => *retry_after_ms,
            _ => None,
        }
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit | ErrorCategory::Unavailable => {
                RecoverySuggestion::RetryWithBackoff
            }
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::BadRequest | ErrorCategory::Protocol => {
                RecoverySuggestion::CheckRequest
            }
            ErrorCategory::ToolExecution => RecoverySuggestion::CheckToolImplementation,
            ErrorCategory::Session => RecoverySuggestion::StartNewSession,
            _ => RecoverySuggestion::ContactSupport,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ChatError>;
