//! Tool trait: the abstraction over model-invokable capabilities.
//!
//! The engine never knows what a tool does. It hands the raw argument payload
//! (wrapped in `ToolArguments`) and the conversation context to the tool's
//! resolver and feeds the returned text back to the model.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::conversation::ConversationContext;
use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// The raw argument payload of one tool-use block.
///
/// Acts as the argument deserializer: resolvers call [`ToolArguments::parse`]
/// with the type they expect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolArguments {
    raw: String,
}

impl ToolArguments {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The payload exactly as the provider sent it.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Deserialize the payload. An empty payload is read as `{}`.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ToolError> {
        let raw = if self.raw.trim().is_empty() { "{}" } else { self.raw.as_str() };
        serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments(e.to_string()))
    }

    /// The payload as an untyped JSON value.
    pub fn value(&self) -> Result<serde_json::Value, ToolError> {
        self.parse()
    }
}

/// The core Tool trait.
///
/// Tools are stateless descriptors; resolvers may perform I/O. A resolver is
/// called at most once per tool-use block.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "lookup_user").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Resolve one call. The returned text is fed back to the model.
    async fn resolve(
        &self,
        arguments: ToolArguments,
        context: &ConversationContext,
    ) -> Result<String, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// The tools offered in one conversation.
///
/// Keeps declaration order (the order tools are presented to the model) and
/// unique names. Cheap to clone.
#[derive(Clone, Default)]
pub struct ToolStore {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name, in
    /// place.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        match self.tools.iter().position(|t| t.name() == tool.name()) {
            Some(i) => self.tools[i] = tool,
            None => self.tools.push(tool),
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, tool: Arc<dyn Tool>) -> Self {
        self.register(tool);
        self
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names, in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Resolve a call against the named tool.
    pub async fn resolve(
        &self,
        name: &str,
        arguments: ToolArguments,
        context: &ConversationContext,
    ) -> Result<String, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.resolve(arguments, context).await
    }
}

impl std::fmt::Debug for ToolStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolStore").field("tools", &self.names()).finish()
    }
}
