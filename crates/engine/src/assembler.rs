//! Conversation assembly: posts in, provider turns out.
//!
//! System posts are concatenated into the system prompt. User and bot posts
//! are grouped into alternating user/assistant turns, one turn per run of
//! same-role posts. Attached images become base64 blocks; files that cannot
//! be sent become short diagnostic text blocks instead of failing the request.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use parley_core::conversation::{Post, PostFile, PostRole};
use parley_core::wire::{AssembledConversation, ContentBlock, WireMessage, WireRole};
use tracing::warn;

/// Image types the provider accepts.
pub const SUPPORTED_IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// One completed tool round, replayed in every later round of the same
/// operation.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExchange {
    /// The assistant turn that asked for the tools (text and tool-use blocks)
    pub assistant: Vec<ContentBlock>,
    /// One tool-result block per tool-use, in the same order
    pub results: Vec<ContentBlock>,
}

/// Build the system prompt and provider turns for one round.
///
/// `pending` holds the tool exchanges of earlier rounds, oldest first. They
/// follow the posts as assistant/user pairs, so every tool result lands in a
/// user turn right after the assistant turn holding its tool-use.
pub fn assemble(posts: &[Post], pending: &[ToolExchange]) -> AssembledConversation {
    let mut builder = TurnBuilder::default();

    for post in posts {
        let role = match post.role {
            PostRole::System => {
                builder.system.push_str(&post.message);
                continue;
            }
            PostRole::User => WireRole::User,
            PostRole::Bot => WireRole::Assistant,
        };

        builder.switch_to(role);
        if !post.message.is_empty() {
            builder.buffer.push(ContentBlock::text(post.message.clone()));
        }
        builder.buffer.extend(post.files.iter().map(file_block));
    }

    for exchange in pending {
        builder.switch_to(WireRole::Assistant);
        builder.buffer.extend(exchange.assistant.iter().cloned());
        builder.switch_to(WireRole::User);
        builder.buffer.extend(exchange.results.iter().cloned());
    }

    builder.finish()
}

/// Convert one attached file to a content block.
fn file_block(file: &PostFile) -> ContentBlock {
    if !SUPPORTED_IMAGE_TYPES.contains(&file.mime_type.as_str()) {
        return ContentBlock::text(format!("[Unsupported image type: {}]", file.mime_type));
    }

    match file.source.read() {
        Ok(bytes) => ContentBlock::Image {
            media_type: file.mime_type.clone(),
            data: STANDARD.encode(bytes),
        },
        Err(e) => {
            warn!(mime_type = %file.mime_type, error = %e, "Failed to read attached file");
            ContentBlock::text("[Error reading image data]")
        }
    }
}

#[derive(Default)]
struct TurnBuilder {
    system: String,
    role: Option<WireRole>,
    buffer: Vec<ContentBlock>,
    messages: Vec<WireMessage>,
}

impl TurnBuilder {
    fn switch_to(&mut self, role: WireRole) {
        if self.role != Some(role) {
            self.flush();
            self.role = Some(role);
        }
    }

    /// Emit the buffered blocks as a turn. A turn whose role matches the
    /// previous one (an empty turn was skipped in between) is merged into it.
    fn flush(&mut self) {
        let Some(role) = self.role else {
            return;
        };
        if self.buffer.is_empty() {
            return;
        }
        let content = std::mem::take(&mut self.buffer);
        match self.messages.last_mut() {
            Some(last) if last.role == role => last.content.extend(content),
            _ => self.messages.push(WireMessage { role, content }),
        }
    }

    fn finish(mut self) -> AssembledConversation {
        self.flush();
        AssembledConversation {
            system: self.system,
            messages: self.messages,
        }
    }
}
