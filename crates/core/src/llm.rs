//! Per-request language model settings.

use serde::{Deserialize, Serialize};

/// Default number of tokens a provider may generate per round.
pub const DEFAULT_MAX_GENERATED_TOKENS: u32 = 4096;

/// Context window assumed when a provider has no configured limit.
pub const DEFAULT_TOKEN_LIMIT: usize = 100_000;

/// Effective settings for one completion operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub max_generated_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_limit: Option<usize>,
}

impl LlmConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_generated_tokens: DEFAULT_MAX_GENERATED_TOKENS,
            token_limit: None,
        }
    }

    /// Apply options in order. Later options win per field.
    pub fn apply(mut self, options: &[LlmOption]) -> Self {
        for option in options {
            option.apply_to(&mut self);
        }
        self
    }
}

/// One override applied on top of a provider's default config.
#[derive(Debug, Clone, PartialEq)]
pub enum LlmOption {
    Model(String),
    MaxTokens(u32),
    TokenLimit(usize),
}

impl LlmOption {
    pub fn model(model: impl Into<String>) -> Self {
        Self::Model(model.into())
    }

    pub fn max_tokens(max: u32) -> Self {
        Self::MaxTokens(max)
    }

    pub fn token_limit(limit: usize) -> Self {
        Self::TokenLimit(limit)
    }

    fn apply_to(&self, config: &mut LlmConfig) {
        match self {
            Self::Model(model) => config.model = model.clone(),
            Self::MaxTokens(max) => config.max_generated_tokens = *max,
            Self::TokenLimit(limit) => config.token_limit = Some(*limit),
        }
    }
}
