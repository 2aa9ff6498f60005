//! Unified error classification and recovery.

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    Storage,
    Unavailable,
    NotFound,
    InvalidInput,
    ToolExecution,
    Unknown,
}

/// Suggested recovery action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoverySuggestion {
    RetryWithBackoff,
    /// The backend is reconnecting; the same request should succeed soon.
    RetryShortly,
    CheckCredentials,
    CheckConfiguration,
    IncreaseTimeout,
    FixRequest,
    CheckToolImplementation,
    ContactSupport,
}
