//! `parley chat`: stream one answer to stdout.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, anyhow};
use parley_config::{AppConfig, BotConfig};
use parley_core::conversation::{
    BotConversation, ConversationContext, FileSource, Post, PostFile, UserRef,
};
use parley_core::error::CompletionError;
use parley_core::event::EventBus;
use parley_core::llm::DEFAULT_MAX_GENERATED_TOKENS;
use parley_engine::{CancellationRegistry, ChatEngine};
use tracing::{debug, info};

pub struct ChatArgs {
    pub message: String,
    pub bot: Option<String>,
    pub images: Vec<PathBuf>,
    pub system: Option<String>,
}

pub async fn run(args: ChatArgs) -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;

    let bot_name = args.bot.clone().unwrap_or_else(|| config.default_bot_name.clone());
    let bot = config
        .bot(&bot_name)
        .ok_or_else(|| anyhow!("No bot named '{bot_name}' is configured"))?;

    if bot.service.api_key.is_none() {
        eprintln!();
        eprintln!("  ERROR: No API key configured for bot '{}'!", bot.name);
        eprintln!();
        eprintln!("  Set PARLEY_API_KEY or ANTHROPIC_API_KEY, or add `api_key` to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err(anyhow!("No API key found. See above for setup instructions."));
    }

    let provider = parley_providers::from_service_config(&bot.service, config.enable_llm_trace)?;

    let key = uuid::Uuid::new_v4().to_string();
    let mut conversation = build_conversation(bot, &args);
    conversation.context = request_context(&key);

    let budget = provider
        .token_limit()
        .saturating_sub(DEFAULT_MAX_GENERATED_TOKENS as usize);
    if conversation.truncate(budget, |text| provider.count_tokens(text)) {
        info!(budget, "Conversation truncated to fit the token limit");
    }

    let event_bus = Arc::new(EventBus::default());
    let engine = ChatEngine::new(provider).with_event_bus(event_bus.clone());
    let registry = CancellationRegistry::new();
    let registration = registry.register(key.clone());

    let mut events = event_bus.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            debug!(?event, "Engine event");
        }
    });

    let mut result = engine.chat_completion_registered(&conversation, registration, &[]);

    let ctrl_c_registry = registry.clone();
    let ctrl_c_key = key.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_registry.cancel(&ctrl_c_key);
        }
    });

    let mut stdout = std::io::stdout();
    while let Some(delta) = result.next_delta().await {
        stdout.write_all(delta.as_bytes())?;
        stdout.flush()?;
    }
    println!();

    match result.outcome().await {
        Ok(()) => Ok(()),
        Err(CompletionError::Cancelled) => {
            eprintln!("  Cancelled.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// The bot's instructions and the request's extra system text, followed by
/// the user's message with any attached images.
fn build_conversation(bot: &BotConfig, args: &ChatArgs) -> BotConversation {
    let mut conversation = BotConversation::new();

    if !bot.custom_instructions.is_empty() {
        conversation.push(Post::system(bot.custom_instructions.clone()));
    }
    if let Some(system) = args.system.as_deref().filter(|s| !s.is_empty()) {
        let separator = if bot.custom_instructions.is_empty() { "" } else { "\n\n" };
        conversation.push(Post::system(format!("{separator}{system}")));
    }

    let mut post = Post::user(args.message.clone());
    for path in &args.images {
        post = post.with_file(PostFile::new(mime_type_for(path), FileSource::Path(path.clone())));
    }
    conversation.push(post);

    conversation
}

fn request_context(post_id: &str) -> ConversationContext {
    let username = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "local".into());

    ConversationContext {
        requesting_user: Some(UserRef {
            id: username.clone(),
            username,
        }),
        post_id: Some(post_id.to_string()),
        ..ConversationContext::default()
    }
}

/// Guess a MIME type from the file extension.
fn mime_type_for(path: &Path) -> String {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
    .to_string()
}
