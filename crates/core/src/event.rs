//! Domain event system: decoupled observation of completion operations.
//!
//! The engine publishes events as operations progress. Subscribers (metrics,
//! tracing exporters, tests) react without being coupled to the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A top-level completion operation started
    CompletionRequested {
        operation_id: String,
        provider: String,
        model: String,
        timestamp: DateTime<Utc>,
    },

    /// One round's stream ended cleanly
    RoundCompleted {
        operation_id: String,
        depth: usize,
        tool_uses: usize,
        timestamp: DateTime<Utc>,
    },

    /// A tool resolver returned
    ToolResolved {
        operation_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// The operation ended. `error_kind` is `None` on success.
    CompletionFinished {
        operation_id: String,
        rounds: usize,
        error_kind: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
