//! Error types for the repolens domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`ErrorKind`] is the
//! closed, user-facing taxonomy every failure is eventually folded into.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The failure taxonomy surfaced to the reasoning loop and to callers.
///
/// Tool observations carry one of these in `ToolResult::error`; a failed
/// loop reports the kind that ended it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or invalid credentials/configuration (startup-time).
    Configuration,
    /// The repository does not exist or is not accessible.
    RepoNotFound,
    /// A path or ref inside an existing repository does not exist.
    NotFound,
    /// GitHub's primary rate limit is exhausted.
    RateLimited,
    /// GitHub's search (secondary) rate limit was hit.
    SearchRateLimited,
    /// The GitHub token was rejected.
    Unauthorized,
    /// The LLM proposed an unknown tool or mistyped arguments.
    InvalidToolCall,
    /// The completion service failed twice in a row.
    LlmUnavailable,
    /// The iteration cap was reached without a final answer.
    LoopExhausted,
    /// The wall-clock budget for the request ran out.
    LoopTimeout,
    /// The non-truncatable prompt does not fit the context ceiling.
    ContextOverflow,
    /// Network failure talking to GitHub after retries.
    Transport,
}

impl ErrorKind {
    /// Stable identifier used in observations and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration_error",
            Self::RepoNotFound => "repo_not_found",
            Self::NotFound => "not_found",
            Self::RateLimited => "rate_limited",
            Self::SearchRateLimited => "search_rate_limited",
            Self::Unauthorized => "unauthorized",
            Self::InvalidToolCall => "invalid_tool_call",
            Self::LlmUnavailable => "llm_unavailable",
            Self::LoopExhausted => "loop_exhausted",
            Self::LoopTimeout => "loop_timeout",
            Self::ContextOverflow => "context_overflow",
            Self::Transport => "transport_error",
        }
    }

    /// Whether an observation of this kind ends the request.
    ///
    /// Everything else is fed back to the model so it can adapt.
    pub fn is_terminal_observation(&self) -> bool {
        matches!(self, Self::RepoNotFound | Self::Unauthorized)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GithubError {
    #[error("GitHub rejected the access token: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limited (retry after {retry_after_secs:?}s)")]
    RateLimited {
        retry_after_secs: Option<u64>,
        secondary: bool,
    },

    #[error("Unprocessable request: {0}")]
    Unprocessable(String),

    #[error("GitHub API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode GitHub response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },
}
