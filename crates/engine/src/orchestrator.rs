//! The tool-resolution loop.
//!
//! One top-level request runs as a state machine over rounds inside a single
//! task. Each round assembles the conversation, streams the model's answer
//! (forwarding text as it arrives), and if the model asked for tools,
//! resolves them and starts the next round with the results. The caller only
//! sees the two channels of the returned [`TextStreamResult`].

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use parley_core::accumulate::{AccumulatedMessage, MessageAccumulator};
use parley_core::conversation::BotConversation;
use parley_core::error::CompletionError;
use parley_core::event::{DomainEvent, EventBus};
use parley_core::llm::{LlmConfig, LlmOption};
use parley_core::provider::{CompletionProvider, CompletionRequest, StreamEvent};
use parley_core::stream::{StreamSender, TextStreamResult};
use parley_core::wire::ContentBlock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assembler::{ToolExchange, assemble};
use crate::cancel::Registration;

/// Maximum number of provider rounds in one operation.
pub const MAX_TOOL_RESOLUTION_DEPTH: usize = 10;

/// Runs streaming completions with tool resolution against one provider.
#[derive(Clone)]
pub struct ChatEngine {
    provider: Arc<dyn CompletionProvider>,
    event_bus: Option<Arc<EventBus>>,
}

impl ChatEngine {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self {
            provider,
            event_bus: None,
        }
    }

    /// Publish operation events on `bus`.
    pub fn with_event_bus(mut self, bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(bus);
        self
    }

    pub fn provider(&self) -> &Arc<dyn CompletionProvider> {
        &self.provider
    }

    /// Start a streaming completion. Must be called within a tokio runtime.
    ///
    /// The conversation is copied; the caller's posts are never touched.
    pub fn chat_completion(
        &self,
        conversation: &BotConversation,
        options: &[LlmOption],
    ) -> TextStreamResult {
        self.spawn(conversation, options, CancellationToken::new(), None)
    }

    /// Start a streaming completion that can be cancelled through the
    /// registry that issued `registration`. The entry is removed when the
    /// operation ends, whatever the outcome.
    pub fn chat_completion_registered(
        &self,
        conversation: &BotConversation,
        registration: Registration,
        options: &[LlmOption],
    ) -> TextStreamResult {
        let token = registration.token();
        self.spawn(conversation, options, token, Some(registration))
    }

    /// Run a completion to the end and return all of its text.
    pub async fn chat_completion_no_stream(
        &self,
        conversation: &BotConversation,
        options: &[LlmOption],
    ) -> Result<String, CompletionError> {
        self.chat_completion(conversation, options).read_all().await
    }

    fn spawn(
        &self,
        conversation: &BotConversation,
        options: &[LlmOption],
        token: CancellationToken,
        registration: Option<Registration>,
    ) -> TextStreamResult {
        let (sender, result) = TextStreamResult::channel();
        let operation = Operation {
            id: uuid::Uuid::new_v4().to_string(),
            provider: Arc::clone(&self.provider),
            event_bus: self.event_bus.clone(),
            config: self.provider.default_config().apply(options),
            conversation: conversation.clone(),
            token,
            pending: Vec::new(),
            rounds: 0,
            registration,
        };

        tokio::spawn(operation.run(sender));

        result
    }
}

impl std::fmt::Debug for ChatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatEngine")
            .field("provider", &self.provider.name())
            .field("event_bus", &self.event_bus.is_some())
            .finish()
    }
}

/// State of one top-level request.
struct Operation {
    id: String,
    provider: Arc<dyn CompletionProvider>,
    event_bus: Option<Arc<EventBus>>,
    config: LlmConfig,
    conversation: BotConversation,
    token: CancellationToken,
    /// Tool exchanges of completed rounds, oldest first
    pending: Vec<ToolExchange>,
    rounds: usize,
    /// Released before the caller can observe the outcome
    registration: Option<Registration>,
}

impl Operation {
    async fn run(mut self, sender: StreamSender) {
        info!(
            operation_id = %self.id,
            provider = %self.provider.name(),
            model = %self.config.model,
            posts = self.conversation.posts.len(),
            tools = self.conversation.tools.len(),
            "Starting chat completion"
        );
        self.publish(DomainEvent::CompletionRequested {
            operation_id: self.id.clone(),
            provider: self.provider.name().to_string(),
            model: self.config.model.clone(),
            timestamp: Utc::now(),
        });

        let result = self.run_rounds(&sender).await;

        match &result {
            Ok(()) => info!(operation_id = %self.id, rounds = self.rounds, "Chat completion finished"),
            Err(e) => warn!(operation_id = %self.id, rounds = self.rounds, error = %e, "Chat completion failed"),
        }
        self.publish(DomainEvent::CompletionFinished {
            operation_id: self.id.clone(),
            rounds: self.rounds,
            error_kind: result.as_ref().err().map(|e| e.kind().to_string()),
            timestamp: Utc::now(),
        });

        drop(self.registration.take());
        sender.finish(result);
    }

    async fn run_rounds(&mut self, sender: &StreamSender) -> Result<(), CompletionError> {
        loop {
            let depth = self.rounds;
            if depth >= MAX_TOOL_RESOLUTION_DEPTH {
                return Err(CompletionError::DepthExceeded {
                    max_depth: MAX_TOOL_RESOLUTION_DEPTH,
                });
            }
            if self.token.is_cancelled() {
                return Err(CompletionError::Cancelled);
            }

            self.rounds += 1;
            let message = self.stream_round(depth, sender).await?;

            // Tool-use blocks are ignored when the request offered no tools.
            let tool_uses = if self.conversation.tools.is_empty() || !message.has_tool_use() {
                0
            } else {
                message.tool_uses().count()
            };
            debug!(
                operation_id = %self.id,
                depth,
                tool_uses,
                text_len = message.text().len(),
                stop_reason = message.stop_reason.as_deref().unwrap_or("none"),
                "Round complete"
            );
            self.publish(DomainEvent::RoundCompleted {
                operation_id: self.id.clone(),
                depth,
                tool_uses,
                timestamp: Utc::now(),
            });

            if tool_uses == 0 {
                return Ok(());
            }

            let results = self.resolve_tools(&message).await?;
            self.pending.push(ToolExchange {
                assistant: message.to_wire_blocks(),
                results,
            });
        }
    }

    /// Stream one round, forwarding text deltas live.
    async fn stream_round(
        &self,
        depth: usize,
        sender: &StreamSender,
    ) -> Result<AccumulatedMessage, CompletionError> {
        let assembled = assemble(&self.conversation.posts, &self.pending);
        let request = CompletionRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_generated_tokens,
            system: assembled.system,
            messages: assembled.messages,
            tools: self.conversation.tools.definitions(),
        };
        debug!(
            operation_id = %self.id,
            depth,
            messages = request.messages.len(),
            "Requesting completion"
        );

        let mut events = tokio::select! {
            biased;
            _ = self.token.cancelled() => return Err(CompletionError::Cancelled),
            stream = self.provider.begin_stream(request) => stream?,
        };

        // Returning early drops `events`, which aborts the provider stream.
        let mut accumulator = MessageAccumulator::new();
        loop {
            let item = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Err(CompletionError::Cancelled),
                _ = sender.consumer_gone() => return Err(CompletionError::Cancelled),
                item = events.recv() => item,
            };

            let event = match item {
                // Sender gone without message_stop: treat as a clean end.
                None => break,
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(event)) => event,
            };

            if let StreamEvent::TextDelta { text, .. } = &event {
                let delivered = tokio::select! {
                    biased;
                    _ = self.token.cancelled() => return Err(CompletionError::Cancelled),
                    delivered = sender.send_text(text.clone()) => delivered,
                };
                if !delivered {
                    return Err(CompletionError::Cancelled);
                }
            }

            accumulator.apply(&event);
            if matches!(event, StreamEvent::MessageStop { .. }) {
                break;
            }
        }

        Ok(accumulator.finish())
    }

    /// Resolve every tool-use of `message` in order. The first failure aborts
    /// the whole batch.
    async fn resolve_tools(
        &self,
        message: &AccumulatedMessage,
    ) -> Result<Vec<ContentBlock>, CompletionError> {
        let mut results = Vec::new();

        for call in message.tool_uses() {
            let started = Instant::now();
            let outcome = match call.arguments.value() {
                Err(e) => Err(e),
                Ok(_) => tokio::select! {
                    biased;
                    _ = self.token.cancelled() => return Err(CompletionError::Cancelled),
                    outcome = self.conversation.tools.resolve(
                        &call.name,
                        call.arguments.clone(),
                        &self.conversation.context,
                    ) => outcome,
                },
            };
            let duration_ms = started.elapsed().as_millis() as u64;

            self.publish(DomainEvent::ToolResolved {
                operation_id: self.id.clone(),
                tool_name: call.name.clone(),
                success: outcome.is_ok(),
                duration_ms,
                timestamp: Utc::now(),
            });

            match outcome {
                Ok(text) => {
                    debug!(operation_id = %self.id, tool = %call.name, duration_ms, "Tool resolved");
                    results.push(ContentBlock::tool_result(call.id.clone(), text));
                }
                Err(source) => {
                    return Err(CompletionError::ToolResolution {
                        tool_name: call.name.clone(),
                        source,
                    });
                }
            }
        }

        Ok(results)
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(bus) = &self.event_bus {
            bus.publish(event);
        }
    }
}
