//! Scripted providers and tools for engine tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parley_core::conversation::ConversationContext;
use parley_core::error::{ProviderError, ToolError};
use parley_core::llm::LlmConfig;
use parley_core::provider::{CompletionProvider, CompletionRequest, EventReceiver, StreamEvent};
use parley_core::tool::{Tool, ToolArguments};
use serde::Deserialize;
use tokio::sync::{Notify, mpsc};

/// The canned response of one round.
#[derive(Debug, Clone)]
pub struct Script {
    pub events: Vec<Result<StreamEvent, ProviderError>>,
    /// Keep the stream open after the last event until the consumer leaves.
    pub hang: bool,
}

impl Script {
    pub fn text(chunks: &[&str]) -> Self {
        let mut events: Vec<_> = chunks
            .iter()
            .map(|c| Ok(StreamEvent::TextDelta { index: 0, text: (*c).to_string() }))
            .collect();
        events.push(Ok(StreamEvent::BlockStop { index: 0 }));
        events.push(Ok(StreamEvent::MessageStop { stop_reason: Some("end_turn".into()) }));
        Self { events, hang: false }
    }

    /// Optional lead-in text, then one tool-use block.
    pub fn tool_use(text: &str, id: &str, name: &str, json: &str) -> Self {
        let mut events = Vec::new();
        if !text.is_empty() {
            events.push(Ok(StreamEvent::TextDelta { index: 0, text: text.to_string() }));
            events.push(Ok(StreamEvent::BlockStop { index: 0 }));
        }
        events.push(Ok(StreamEvent::ToolUseStart {
            index: 1,
            id: id.to_string(),
            name: name.to_string(),
        }));
        events.push(Ok(StreamEvent::ToolInputDelta {
            index: 1,
            partial_json: json.to_string(),
        }));
        events.push(Ok(StreamEvent::BlockStop { index: 1 }));
        events.push(Ok(StreamEvent::MessageStop { stop_reason: Some("tool_use".into()) }));
        Self { events, hang: false }
    }

    /// Some text, then a transport failure.
    pub fn failing(text: &str, error: ProviderError) -> Self {
        Self {
            events: vec![
                Ok(StreamEvent::TextDelta { index: 0, text: text.to_string() }),
                Err(error),
            ],
            hang: false,
        }
    }

    /// Some text, then nothing until the stream is abandoned.
    pub fn hanging(text: &str) -> Self {
        Self {
            events: vec![Ok(StreamEvent::TextDelta { index: 0, text: text.to_string() })],
            hang: true,
        }
    }
}

/// Plays one script per call. The last script repeats once the queue runs dry.
pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    last: Mutex<Option<Script>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
    abandoned: std::sync::Arc<AtomicUsize>,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            last: Mutex::new(None),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            abandoned: Default::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// How many hanging streams saw their consumer go away.
    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    fn next_script(&self) -> Script {
        let mut last = self.last.lock().unwrap();
        if let Some(script) = self.scripts.lock().unwrap().pop_front() {
            *last = Some(script);
        }
        last.clone().expect("ScriptedProvider needs at least one script")
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_config(&self) -> LlmConfig {
        LlmConfig::new("scripted-model")
    }

    async fn begin_stream(&self, request: CompletionRequest) -> Result<EventReceiver, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let script = self.next_script();

        let (tx, rx) = mpsc::channel(16);
        let abandoned = self.abandoned.clone();
        tokio::spawn(async move {
            for event in script.events {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            if script.hang {
                tx.closed().await;
                abandoned.fetch_add(1, Ordering::SeqCst);
            }
        });
        Ok(rx)
    }
}

/// Provider whose request itself fails.
pub struct RejectingProvider;

#[async_trait]
impl CompletionProvider for RejectingProvider {
    fn name(&self) -> &str {
        "rejecting"
    }

    fn default_config(&self) -> LlmConfig {
        LlmConfig::new("rejecting-model")
    }

    async fn begin_stream(&self, _request: CompletionRequest) -> Result<EventReceiver, ProviderError> {
        Err(ProviderError::AuthenticationFailed("bad key".into()))
    }
}

#[derive(Deserialize)]
struct LookupArgs {
    username: String,
}

/// Looks up a user's email, recording what it was called with.
#[derive(Default)]
pub struct LookupUserTool {
    pub seen: Mutex<Vec<(String, Option<String>)>>,
}

#[async_trait]
impl Tool for LookupUserTool {
    fn name(&self) -> &str {
        "lookup_user"
    }

    fn description(&self) -> &str {
        "Look up a user's email address by username"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": { "username": { "type": "string" } },
            "required": ["username"]
        })
    }

    async fn resolve(
        &self,
        arguments: ToolArguments,
        context: &ConversationContext,
    ) -> Result<String, ToolError> {
        let args: LookupArgs = arguments.parse()?;
        let requester = context.requesting_user.as_ref().map(|u| u.username.clone());
        self.seen.lock().unwrap().push((args.username.clone(), requester));
        Ok(format!("{}@example.com", args.username))
    }
}

/// Always fails.
pub struct BrokenTool;

#[async_trait]
impl Tool for BrokenTool {
    fn name(&self) -> &str {
        "broken"
    }

    fn description(&self) -> &str {
        "Never works"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }

    async fn resolve(
        &self,
        _arguments: ToolArguments,
        _context: &ConversationContext,
    ) -> Result<String, ToolError> {
        Err(ToolError::ExecutionFailed {
            tool_name: "broken".into(),
            reason: "backend unavailable".into(),
        })
    }
}

/// Panics instead of answering.
pub struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &str {
        "boom"
    }

    fn description(&self) -> &str {
        "Crashes the resolving task"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }

    async fn resolve(
        &self,
        _arguments: ToolArguments,
        _context: &ConversationContext,
    ) -> Result<String, ToolError> {
        panic!("resolver crashed");
    }
}

/// Signals `started`, then never returns.
#[derive(Default)]
pub struct BlockingTool {
    pub started: Notify,
}

#[async_trait]
impl Tool for BlockingTool {
    fn name(&self) -> &str {
        "slow_lookup"
    }

    fn description(&self) -> &str {
        "A lookup that never finishes"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({ "type": "object" })
    }

    async fn resolve(
        &self,
        _arguments: ToolArguments,
        _context: &ConversationContext,
    ) -> Result<String, ToolError> {
        self.started.notify_one();
        std::future::pending().await
    }
}
