//! # Parley Engine
//!
//! Turns a [`BotConversation`](parley_core::BotConversation) into a live
//! stream of text. One top-level request runs as a sequence of rounds on its
//! own task: assemble the conversation, stream the model's answer, resolve
//! any tools it asked for, and go again until it stops asking.

pub mod assembler;
pub mod cancel;
pub mod orchestrator;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use assembler::{ToolExchange, assemble};
pub use cancel::{CancellationRegistry, Registration};
pub use orchestrator::{ChatEngine, MAX_TOOL_RESOLUTION_DEPTH};
