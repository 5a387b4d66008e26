//! Conversation domain types.
//!
//! A `BotConversation` is what a caller hands to the engine: an ordered list
//! of role-tagged posts, the tools the model may call, and an opaque context
//! that is passed through to tool resolvers untouched.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::tool::ToolStore;

/// Who authored a post, from the bot's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostRole {
    /// A human participant
    User,
    /// The bot itself (earlier answers)
    Bot,
    /// Instructions that become the system prompt
    System,
}

/// Where the bytes of an attached file come from.
///
/// Sources are re-readable: the engine reassembles the conversation every
/// round, so a file may be read more than once per operation.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Bytes already in memory.
    Inline(Arc<[u8]>),
    /// A file on disk, read lazily at assembly time.
    Path(PathBuf),
}

impl FileSource {
    /// Read the full contents.
    pub fn read(&self) -> std::io::Result<Vec<u8>> {
        match self {
            Self::Inline(bytes) => Ok(bytes.to_vec()),
            Self::Path(path) => std::fs::read(path),
        }
    }
}

impl From<Vec<u8>> for FileSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Inline(bytes.into())
    }
}

/// A file attached to a post.
#[derive(Debug, Clone)]
pub struct PostFile {
    /// MIME type as reported by the uploader (e.g. "image/png")
    pub mime_type: String,

    /// The file contents
    pub source: FileSource,
}

impl PostFile {
    pub fn new(mime_type: impl Into<String>, source: impl Into<FileSource>) -> Self {
        Self {
            mime_type: mime_type.into(),
            source: source.into(),
        }
    }
}

/// One conversational turn fragment.
#[derive(Debug, Clone)]
pub struct Post {
    pub role: PostRole,
    pub message: String,
    pub files: Vec<PostFile>,
}

impl Post {
    pub fn new(role: PostRole, message: impl Into<String>) -> Self {
        Self {
            role,
            message: message.into(),
            files: Vec::new(),
        }
    }

    /// Create a user post.
    pub fn user(message: impl Into<String>) -> Self {
        Self::new(PostRole::User, message)
    }

    /// Create a bot post.
    pub fn bot(message: impl Into<String>) -> Self {
        Self::new(PostRole::Bot, message)
    }

    /// Create a system post.
    pub fn system(message: impl Into<String>) -> Self {
        Self::new(PostRole::System, message)
    }

    /// Attach a file.
    pub fn with_file(mut self, file: PostFile) -> Self {
        self.files.push(file);
        self
    }
}

/// A reference to the user on whose behalf the bot is answering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: String,
    pub username: String,
}

/// A reference to the channel the conversation happens in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub id: String,
    /// Empty for direct messages, which belong to no team.
    #[serde(default)]
    pub team_id: String,
}

/// Context handed to tool resolvers. The engine never interprets it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requesting_user: Option<UserRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<ChannelRef>,

    /// The post being answered, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,

    /// Free-form prompt parameters (e.g. a formatted thread)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub prompt_parameters: HashMap<String, String>,
}

/// A post as stored in a chat thread, before role classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadPost {
    pub user_id: String,
    pub message: String,
}

/// An ordered conversation plus the tools available for this exchange.
#[derive(Debug, Clone, Default)]
pub struct BotConversation {
    /// Chronological posts. Order is load-bearing.
    pub posts: Vec<Post>,

    /// Tools the model may call
    pub tools: ToolStore,

    /// Opaque resolver context
    pub context: ConversationContext,
}

impl BotConversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a conversation from a chat thread: posts by `bot_id` become
    /// bot posts, everything else user posts.
    pub fn from_thread(bot_id: &str, thread: &[ThreadPost]) -> Self {
        let posts = thread
            .iter()
            .map(|p| {
                let role = if p.user_id == bot_id {
                    PostRole::Bot
                } else {
                    PostRole::User
                };
                Post::new(role, p.message.clone())
            })
            .collect();
        Self {
            posts,
            ..Self::default()
        }
    }

    pub fn with_tools(mut self, tools: ToolStore) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_context(mut self, context: ConversationContext) -> Self {
        self.context = context;
        self
    }

    /// Append a post.
    pub fn push(&mut self, post: Post) {
        self.posts.push(post);
    }

    /// Append a user post.
    pub fn add_user_post(&mut self, message: impl Into<String>) {
        self.posts.push(Post::user(message));
    }

    /// Append all posts of another conversation. Its tools and context are
    /// ignored.
    pub fn append_conversation(&mut self, other: BotConversation) {
        self.posts.extend(other.posts);
    }

    /// Concatenate the text of every system post, in order.
    pub fn extract_system_message(&self) -> String {
        self.posts
            .iter()
            .filter(|p| p.role == PostRole::System)
            .map(|p| p.message.as_str())
            .collect()
    }

    /// Drop the oldest content so the conversation fits in `max_tokens`.
    ///
    /// Walks from the newest post backwards. The first post that does not
    /// fit is dropped when no budget remains, otherwise its front is cut
    /// (4 characters per excess token). Everything older is dropped.
    /// Returns true if anything was removed or cut.
    pub fn truncate(&mut self, max_tokens: usize, count_tokens: impl Fn(&str) -> usize) -> bool {
        let mut total = 0usize;
        for i in (0..self.posts.len()).rev() {
            let post_tokens = count_tokens(&self.posts[i].message);
            if total + post_tokens <= max_tokens {
                total += post_tokens;
                continue;
            }

            let remaining = max_tokens - total;
            let cut_chars = (post_tokens - remaining) * 4;
            let message = &self.posts[i].message;
            if remaining == 0 || cut_chars >= message.chars().count() {
                self.posts.drain(..=i);
            } else {
                let start = message
                    .char_indices()
                    .nth(cut_chars)
                    .map(|(idx, _)| idx)
                    .unwrap_or(message.len());
                self.posts[i].message = message[start..].trim().to_string();
                self.posts.drain(..i);
            }
            return true;
        }
        false
    }
}
