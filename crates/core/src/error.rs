//! Error types for the Parley domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; `CompletionError` is the
//! operation-level error delivered on a stream's error channel.

use thiserror::Error;

/// The top-level error type for all Parley operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Orchestration errors ---
    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Transport-level failures reported by a completion provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

/// Failures raised while resolving a tool call.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

/// The terminal error of a streaming completion.
///
/// Exactly one of these is delivered on the error channel when an operation
/// fails; a successful operation delivers none.
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    /// Network or provider failure. Not retried.
    #[error("transport error: {0}")]
    Transport(#[from] ProviderError),

    /// The tool resolution loop hit its round bound.
    #[error("max tool resolution depth ({max_depth}) exceeded")]
    DepthExceeded { max_depth: usize },

    /// Argument decoding or a resolver failed; the whole operation aborts.
    #[error("tool resolution error: {tool_name}: {source}")]
    ToolResolution {
        tool_name: String,
        #[source]
        source: ToolError,
    },

    /// The operation was stopped through its cancellation signal.
    #[error("completion cancelled")]
    Cancelled,

    /// The producing task ended without reporting an outcome (it panicked
    /// or was aborted).
    #[error("completion aborted before reporting an outcome")]
    Aborted,
}

impl CompletionError {
    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::DepthExceeded { .. } => "depth_exceeded",
            Self::ToolResolution { .. } => "tool_resolution",
            Self::Cancelled => "cancelled",
            Self::Aborted => "aborted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn depth_exceeded_names_the_bound() {
        let err = CompletionError::DepthExceeded { max_depth: 10 };
        assert_eq!(err.to_string(), "max tool resolution depth (10) exceeded");
        assert_eq!(err.kind(), "depth_exceeded");
    }

    #[test]
    fn tool_resolution_keeps_source() {
        let err = CompletionError::ToolResolution {
            tool_name: "lookup_user".into(),
            source: ToolError::InvalidArguments("missing field `username`".into()),
        };
        assert!(err.to_string().contains("lookup_user"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn transport_converts_from_provider_error() {
        let err: CompletionError = ProviderError::Network("connection reset".into()).into();
        assert_eq!(err.kind(), "transport");
        let top: Error = err.into();
        assert!(top.to_string().contains("connection reset"));
    }

    #[test]
    fn top_level_error_wraps_each_context() {
        let errors: Vec<Error> = vec![
            ProviderError::Timeout("30s".into()).into(),
            ToolError::NotFound("weather".into()).into(),
            CompletionError::Aborted.into(),
        ];
        for err in &errors {
            let context = match err {
                Error::Provider(_) => "provider",
                Error::Tool(_) => "tool",
                Error::Completion(_) => "completion",
            };
            assert!(err.to_string().to_lowercase().starts_with(context));
        }
    }

    #[test]
    fn aborted_has_its_own_kind() {
        assert_eq!(CompletionError::Aborted.kind(), "aborted");
        assert_eq!(
            CompletionError::Aborted.to_string(),
            "completion aborted before reporting an outcome"
        );
    }
}
