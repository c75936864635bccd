//! Error classification and recovery.

/// Broad error category for routing retry and recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    /// Temporarily unavailable: 5xx, request timeouts, transport failures.
    Unavailable,
    /// 400-class request rejection. Permanent unless retry is opted in.
    BadRequest,
    Api,
    Configuration,
    Serialization,
    /// The backend answered with something the orchestrator cannot interpret.
    Protocol,
    ToolExecution,
    Session,
    Unknown,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    CheckCredentials,
    CheckConfiguration,
    CheckRequest,
    CheckToolImplementation,
    StartNewSession,
    ContactSupport,
}
