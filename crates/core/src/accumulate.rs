//! Folding a provider event stream into one structured message.

use std::collections::BTreeMap;

use crate::provider::StreamEvent;
use crate::tool::ToolArguments;
use crate::wire::ContentBlock;

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUseRequest {
    /// Provider-assigned id; tool results are keyed by it
    pub id: String,
    pub name: String,
    pub arguments: ToolArguments,
}

/// One finished content block.
#[derive(Debug, Clone, PartialEq)]
pub enum AccumulatedBlock {
    Text(String),
    ToolUse(ToolUseRequest),
}

/// The full response of one round, in block order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccumulatedMessage {
    pub blocks: Vec<AccumulatedBlock>,
    pub stop_reason: Option<String>,
}

impl AccumulatedMessage {
    /// All text blocks, concatenated.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                AccumulatedBlock::Text(t) => Some(t.as_str()),
                AccumulatedBlock::ToolUse(_) => None,
            })
            .collect()
    }

    /// Tool-use blocks in their original order.
    pub fn tool_uses(&self) -> impl Iterator<Item = &ToolUseRequest> {
        self.blocks.iter().filter_map(|b| match b {
            AccumulatedBlock::ToolUse(t) => Some(t),
            AccumulatedBlock::Text(_) => None,
        })
    }

    pub fn has_tool_use(&self) -> bool {
        self.tool_uses().next().is_some()
    }

    /// The message as assistant content blocks, for replaying it to the
    /// provider in the next round. Empty text blocks are skipped.
    pub fn to_wire_blocks(&self) -> Vec<ContentBlock> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                AccumulatedBlock::Text(t) if t.is_empty() => None,
                AccumulatedBlock::Text(t) => Some(ContentBlock::text(t.clone())),
                AccumulatedBlock::ToolUse(t) => Some(ContentBlock::ToolUse {
                    id: t.id.clone(),
                    name: t.name.clone(),
                    input: t
                        .arguments
                        .value()
                        .unwrap_or_else(|_| serde_json::Value::Object(Default::default())),
                }),
            })
            .collect()
    }
}

#[derive(Debug)]
enum PartialBlock {
    Text(String),
    ToolUse { id: String, name: String, json: String },
}

/// Accumulates [`StreamEvent`]s into an [`AccumulatedMessage`].
#[derive(Debug, Default)]
pub struct MessageAccumulator {
    blocks: BTreeMap<usize, PartialBlock>,
    stop_reason: Option<String>,
}

impl MessageAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::TextDelta { index, text } => {
                if let PartialBlock::Text(buf) = self
                    .blocks
                    .entry(*index)
                    .or_insert_with(|| PartialBlock::Text(String::new()))
                {
                    buf.push_str(text);
                }
            }
            StreamEvent::ToolUseStart { index, id, name } => {
                self.blocks.insert(
                    *index,
                    PartialBlock::ToolUse {
                        id: id.clone(),
                        name: name.clone(),
                        json: String::new(),
                    },
                );
            }
            StreamEvent::ToolInputDelta { index, partial_json } => {
                if let Some(PartialBlock::ToolUse { json, .. }) = self.blocks.get_mut(index) {
                    json.push_str(partial_json);
                }
            }
            StreamEvent::BlockStop { .. } => {}
            StreamEvent::MessageStop { stop_reason } => {
                if stop_reason.is_some() {
                    self.stop_reason = stop_reason.clone();
                }
            }
        }
    }

    pub fn finish(self) -> AccumulatedMessage {
        let blocks = self
            .blocks
            .into_values()
            .map(|b| match b {
                PartialBlock::Text(t) => AccumulatedBlock::Text(t),
                PartialBlock::ToolUse { id, name, json } => AccumulatedBlock::ToolUse(ToolUseRequest {
                    id,
                    name,
                    arguments: ToolArguments::new(json),
                }),
            })
            .collect();
        AccumulatedMessage {
            blocks,
            stop_reason: self.stop_reason,
        }
    }
}
