//! Provider trait: the abstraction over LLM streaming backends.
//!
//! A provider knows how to open one streaming request and translate its wire
//! protocol into a sequence of [`StreamEvent`]s. Everything above this trait
//! (assembly, accumulation, tool resolution) is provider-agnostic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ProviderError;
use crate::llm::{DEFAULT_TOKEN_LIMIT, LlmConfig};
use crate::wire::WireMessage;

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: serde_json::Value,
}

/// One streaming round's request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use (e.g., "claude-sonnet-4-20250514")
    pub model: String,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// The system prompt (may be empty)
    #[serde(default)]
    pub system: String,

    /// Alternating user/assistant turns
    pub messages: Vec<WireMessage>,

    /// Available tools the model can call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDefinition>,
}

/// A provider-agnostic streaming event.
///
/// `index` identifies the content block an event belongs to; blocks are
/// ordered by index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Partial text for a text block. Forwarded verbatim to the caller.
    TextDelta { index: usize, text: String },

    /// A tool-use block opened.
    ToolUseStart {
        index: usize,
        id: String,
        name: String,
    },

    /// A fragment of a tool-use block's JSON argument payload.
    ToolInputDelta { index: usize, partial_json: String },

    /// A content block finished.
    BlockStop { index: usize },

    /// The message finished cleanly.
    MessageStop {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_reason: Option<String>,
    },
}

/// Receiving end of a provider stream. Dropping it aborts the request.
pub type EventReceiver = mpsc::Receiver<Result<StreamEvent, ProviderError>>;

/// The core provider trait.
///
/// The engine calls `begin_stream()` once per round without knowing which
/// backend is used. A transport failure, whether before the first event or
/// mid-stream, ends the round.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic").
    fn name(&self) -> &str;

    /// The config every operation starts from before options are applied.
    fn default_config(&self) -> LlmConfig;

    /// Size of the model's context window, in tokens.
    fn token_limit(&self) -> usize {
        DEFAULT_TOKEN_LIMIT
    }

    /// Rough token estimate (4 chars ≈ 1 token).
    fn count_tokens(&self, text: &str) -> usize {
        text.chars().count() / 4
    }

    /// Open one streaming request.
    async fn begin_stream(&self, request: CompletionRequest) -> Result<EventReceiver, ProviderError>;
}
