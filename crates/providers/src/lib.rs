//! LLM provider implementations for Parley.
//!
//! All providers implement the `parley_core::CompletionProvider` trait and
//! translate their wire protocol into `parley_core::StreamEvent`s.

pub mod anthropic;

pub use anthropic::AnthropicProvider;

use std::sync::Arc;

use parley_config::ServiceConfig;
use parley_core::{CompletionProvider, ProviderError};

/// Build the provider described by a service config. With `trace` set,
/// request bodies are logged at trace level.
pub fn from_service_config(
    service: &ServiceConfig,
    trace: bool,
) -> Result<Arc<dyn CompletionProvider>, ProviderError> {
    match service.service_type.as_str() {
        "anthropic" => Ok(Arc::new(
            AnthropicProvider::from_service_config(service)?.with_trace(trace),
        )),
        other => Err(ProviderError::NotConfigured(format!(
            "unsupported service type '{other}'"
        ))),
    }
}
