//! # Parley Core
//!
//! Domain types, traits, and error definitions for the Parley streaming chat
//! engine. This crate has no HTTP or runtime framework dependencies beyond
//! tokio's channels; it defines the model every other crate builds on.
//!
//! ## Layout
//!
//! - [`conversation`]: posts, files and the caller-owned `BotConversation`
//! - [`tool`]: the `Tool` trait and the per-conversation `ToolStore`
//! - [`wire`]: the provider-facing message/content-block view
//! - [`provider`]: the `CompletionProvider` streaming trait and its events
//! - [`accumulate`]: folding a stream into one structured message
//! - [`stream`]: the dual-channel `TextStreamResult`

pub mod accumulate;
pub mod conversation;
pub mod error;
pub mod event;
pub mod llm;
pub mod provider;
pub mod stream;
pub mod tool;
pub mod wire;

// Re-export key types at crate root for ergonomics
pub use accumulate::{AccumulatedBlock, AccumulatedMessage, MessageAccumulator, ToolUseRequest};
pub use conversation::{
    BotConversation, ChannelRef, ConversationContext, FileSource, Post, PostFile, PostRole,
    ThreadPost, UserRef,
};
pub use error::{CompletionError, Error, ProviderError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use llm::{LlmConfig, LlmOption};
pub use provider::{CompletionProvider, CompletionRequest, EventReceiver, StreamEvent, ToolDefinition};
pub use stream::{StreamSender, TextStreamResult};
pub use tool::{Tool, ToolArguments, ToolStore};
pub use wire::{AssembledConversation, ContentBlock, WireMessage, WireRole};
