//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly with server-sent events.
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks
//! - Base64 image blocks
//! - Optional idle timeout between stream chunks

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use parley_config::ServiceConfig;
use parley_core::error::ProviderError;
use parley_core::llm::{DEFAULT_TOKEN_LIMIT, LlmConfig};
use parley_core::provider::{
    CompletionProvider, CompletionRequest, EventReceiver, StreamEvent, ToolDefinition,
};
use parley_core::wire::{ContentBlock, WireMessage};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    default_model: String,
    token_limit: Option<usize>,
    /// Maximum silence between chunks before the stream is failed.
    idle_timeout: Option<Duration>,
    /// Log request bodies at trace level.
    trace_requests: bool,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        // No overall request timeout: a long answer is a long stream.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
            default_model: DEFAULT_MODEL.into(),
            token_limit: None,
            idle_timeout: None,
            trace_requests: false,
        }
    }

    /// Build from a bot's service config.
    pub fn from_service_config(service: &ServiceConfig) -> Result<Self, ProviderError> {
        let api_key = service
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::NotConfigured("Anthropic API key is not set".into()))?;

        let mut provider = Self::new(api_key).with_default_model(&service.default_model);
        if let Some(url) = &service.api_url {
            provider = provider.with_base_url(url);
        }
        if let Some(limit) = service.token_limit {
            provider = provider.with_token_limit(limit);
        }
        if service.streaming_timeout_seconds > 0 {
            provider =
                provider.with_streaming_timeout(Duration::from_secs(service.streaming_timeout_seconds));
        }
        Ok(provider)
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_token_limit(mut self, limit: usize) -> Self {
        self.token_limit = Some(limit);
        self
    }

    /// Fail the stream if no chunk arrives within `timeout`.
    pub fn with_streaming_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace_requests = enabled;
        self
    }

    /// Convert wire messages to Anthropic API format.
    fn to_api_messages(messages: &[WireMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str(),
                content: m.content.iter().map(ApiContentBlock::from).collect(),
            })
            .collect()
    }

    /// Convert tool definitions to Anthropic format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiTool> {
        tools
            .iter()
            .map(|t| ApiTool {
                name: t.name.clone(),
                description: t.description.clone(),
                input_schema: t.parameters.clone(),
            })
            .collect()
    }

    fn build_body(request: &CompletionRequest) -> ApiRequest {
        ApiRequest {
            model: request.model.clone(),
            max_tokens: request.max_tokens,
            system: Some(request.system.clone()).filter(|s| !s.is_empty()),
            messages: Self::to_api_messages(&request.messages),
            tools: Self::to_api_tools(&request.tools),
            stream: true,
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ProviderError::RateLimited { retry_after_secs });
        }
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid Anthropic API key".into(),
            ));
        }
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Anthropic API error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }
        Ok(response)
    }
}

/// Await `fut`, giving up after `limit`. `None` means it timed out.
async fn within<F: Future>(limit: Option<Duration>, fut: F) -> Option<F::Output> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.ok(),
        None => Some(fut.await),
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn default_config(&self) -> LlmConfig {
        LlmConfig::new(self.default_model.clone())
    }

    fn token_limit(&self) -> usize {
        self.token_limit.unwrap_or(DEFAULT_TOKEN_LIMIT)
    }

    async fn begin_stream(&self, request: CompletionRequest) -> Result<EventReceiver, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = Self::build_body(&request);

        debug!(
            provider = "anthropic",
            model = %request.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Sending streaming request"
        );
        if self.trace_requests {
            trace!(body = %serde_json::to_string(&body).unwrap_or_default(), "Anthropic request");
        }

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let response = Self::check_status(response).await?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let idle_timeout = self.idle_timeout;

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut parser = SseParser::default();

            loop {
                let next = tokio::select! {
                    // Consumer gone: dropping the byte stream aborts the request.
                    _ = tx.closed() => {
                        debug!("Stream consumer dropped, aborting Anthropic stream");
                        return;
                    }
                    next = within(idle_timeout, byte_stream.next()) => next,
                };

                let bytes = match next {
                    None => {
                        let _ = tx
                            .send(Err(ProviderError::Timeout(
                                "no stream data received within the streaming timeout".into(),
                            )))
                            .await;
                        return;
                    }
                    Some(None) => return,
                    Some(Some(Err(e))) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                    Some(Some(Ok(bytes))) => bytes,
                };

                for item in parser.push(&bytes) {
                    let last = matches!(item, Ok(StreamEvent::MessageStop { .. }) | Err(_));
                    if tx.send(item).await.is_err() || last {
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

/// Incremental decoder for Anthropic's server-sent events.
#[derive(Debug, Default)]
struct SseParser {
    /// Bytes of an incomplete line. Kept as bytes so a multi-byte character
    /// split across chunks decodes correctly.
    pending: Vec<u8>,
    stop_reason: Option<String>,
}

impl SseParser {
    fn push(&mut self, bytes: &[u8]) -> Vec<Result<StreamEvent, ProviderError>> {
        self.pending.extend_from_slice(bytes);
        let mut out = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            // Event names are repeated in the JSON payload's "type".
            let Some(data) = line.strip_prefix("data:") else {
                continue;
            };
            let data = data.trim();
            if data.is_empty() {
                continue;
            }
            if let Some(item) = self.parse_data(data) {
                out.push(item);
            }
        }

        out
    }

    fn parse_data(&mut self, data: &str) -> Option<Result<StreamEvent, ProviderError>> {
        let event: serde_json::Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                trace!(error = %e, data = %data, "Ignoring unparseable Anthropic SSE");
                return None;
            }
        };
        let index = event["index"].as_u64().unwrap_or(0) as usize;

        match event["type"].as_str().unwrap_or("") {
            "content_block_start" => {
                let block = &event["content_block"];
                match block["type"].as_str() {
                    Some("tool_use") => Some(Ok(StreamEvent::ToolUseStart {
                        index,
                        id: block["id"].as_str().unwrap_or("").to_string(),
                        name: block["name"].as_str().unwrap_or("").to_string(),
                    })),
                    Some("text") => block["text"]
                        .as_str()
                        .filter(|t| !t.is_empty())
                        .map(|t| Ok(StreamEvent::TextDelta { index, text: t.to_string() })),
                    _ => None,
                }
            }
            "content_block_delta" => {
                let delta = &event["delta"];
                match delta["type"].as_str() {
                    Some("text_delta") => delta["text"]
                        .as_str()
                        .map(|t| Ok(StreamEvent::TextDelta { index, text: t.to_string() })),
                    Some("input_json_delta") => delta["partial_json"].as_str().map(|p| {
                        Ok(StreamEvent::ToolInputDelta {
                            index,
                            partial_json: p.to_string(),
                        })
                    }),
                    _ => None,
                }
            }
            "content_block_stop" => Some(Ok(StreamEvent::BlockStop { index })),
            "message_delta" => {
                if let Some(reason) = event["delta"]["stop_reason"].as_str() {
                    self.stop_reason = Some(reason.to_string());
                }
                None
            }
            "message_stop" => Some(Ok(StreamEvent::MessageStop {
                stop_reason: self.stop_reason.take(),
            })),
            "error" => {
                let err = &event["error"];
                Some(Err(ProviderError::StreamInterrupted(format!(
                    "{}: {}",
                    err["type"].as_str().unwrap_or("error"),
                    err["message"].as_str().unwrap_or("unknown provider error")
                ))))
            }
            // message_start, ping
            _ => None,
        }
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: &'static str,
    content: Vec<ApiContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContentBlock {
    Text {
        text: String,
    },
    Image {
        source: ApiImageSource,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize)]
struct ApiImageSource {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: String,
    data: String,
}

impl From<&ContentBlock> for ApiContentBlock {
    fn from(block: &ContentBlock) -> Self {
        match block {
            ContentBlock::Text { text } => Self::Text { text: text.clone() },
            ContentBlock::Image { media_type, data } => Self::Image {
                source: ApiImageSource {
                    source_type: "base64",
                    media_type: media_type.clone(),
                    data: data.clone(),
                },
            },
            ContentBlock::ToolUse { id, name, input } => Self::ToolUse {
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            },
            ContentBlock::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => Self::ToolResult {
                tool_use_id: tool_use_id.clone(),
                content: content.clone(),
                is_error: *is_error,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_core::wire::WireRole;

    const TOOL_USE_STREAM: &str = "event: message_start\n\
data: {\"type\":\"message_start\",\"message\":{\"id\":\"msg_1\",\"content\":[]}}\n\n\
event: content_block_start\n\
data: {\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}\n\n\
event: ping\n\
data: {\"type\":\"ping\"}\n\n\
event: content_block_delta\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Let me \"}}\n\n\
event: content_block_delta\n\
data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"check.\"}}\n\n\
event: content_block_stop\n\
data: {\"type\":\"content_block_stop\",\"index\":0}\n\n\
event: content_block_start\n\
data: {\"type\":\"content_block_start\",\"index\":1,\"content_block\":{\"type\":\"tool_use\",\"id\":\"toolu_01\",\"name\":\"lookup_user\",\"input\":{}}}\n\n\
event: content_block_delta\n\
data: {\"type\":\"content_block_delta\",\"index\":1,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"{\\\"username\\\":\"}}\n\n\
event: content_block_delta\n\
data: {\"type\":\"content_block_delta\",\"index\":1,\"delta\":{\"type\":\"input_json_delta\",\"partial_json\":\"\\\"ann\\\"}\"}}\n\n\
event: content_block_stop\n\
data: {\"type\":\"content_block_stop\",\"index\":1}\n\n\
event: message_delta\n\
data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"tool_use\"},\"usage\":{\"output_tokens\":30}}\n\n\
event: message_stop\n\
data: {\"type\":\"message_stop\"}\n\n";

    fn parse_all(input: &str) -> Vec<Result<StreamEvent, ProviderError>> {
        SseParser::default().push(input.as_bytes())
    }

    #[test]
    fn constructor() {
        let provider = AnthropicProvider::new("sk-ant-test");
        assert_eq!(provider.name(), "anthropic");
        assert_eq!(provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(provider.token_limit(), 100_000);
        assert_eq!(provider.default_config().model, DEFAULT_MODEL);
        assert_eq!(provider.default_config().max_generated_tokens, 4096);
    }

    #[test]
    fn constructor_with_base_url() {
        let provider = AnthropicProvider::new("sk-ant-test")
            .with_base_url("https://custom.proxy.com/");
        assert_eq!(provider.base_url, "https://custom.proxy.com");
    }

    #[test]
    fn from_service_config_requires_key() {
        let service = ServiceConfig::default();
        assert!(matches!(
            AnthropicProvider::from_service_config(&service),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn from_service_config_applies_settings() {
        let service = ServiceConfig {
            api_key: Some("sk-ant-test".into()),
            default_model: "claude-haiku-35-20241022".into(),
            api_url: Some("http://localhost:9999/".into()),
            token_limit: Some(200_000),
            streaming_timeout_seconds: 15,
            ..ServiceConfig::default()
        };
        let provider = AnthropicProvider::from_service_config(&service).unwrap();
        assert_eq!(provider.base_url, "http://localhost:9999");
        assert_eq!(provider.token_limit(), 200_000);
        assert_eq!(provider.idle_timeout, Some(Duration::from_secs(15)));
        assert_eq!(provider.default_config().model, "claude-haiku-35-20241022");
    }

    #[test]
    fn request_body_shape() {
        let request = CompletionRequest {
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 25,
            system: "Be brief.".into(),
            messages: vec![
                WireMessage {
                    role: WireRole::User,
                    content: vec![
                        ContentBlock::text("What is this?"),
                        ContentBlock::Image {
                            media_type: "image/png".into(),
                            data: "iVBORw0KGgo=".into(),
                        },
                    ],
                },
                WireMessage {
                    role: WireRole::Assistant,
                    content: vec![ContentBlock::ToolUse {
                        id: "toolu_1".into(),
                        name: "lookup_user".into(),
                        input: serde_json::json!({"username": "ann"}),
                    }],
                },
                WireMessage {
                    role: WireRole::User,
                    content: vec![ContentBlock::tool_result("toolu_1", "Username: ann")],
                },
            ],
            tools: vec![ToolDefinition {
                name: "lookup_user".into(),
                description: "Look up a user".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
        };

        let body = serde_json::to_value(AnthropicProvider::build_body(&request)).unwrap();
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 25);
        assert_eq!(body["system"], "Be brief.");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"][1]["type"], "image");
        assert_eq!(body["messages"][0]["content"][1]["source"]["type"], "base64");
        assert_eq!(body["messages"][0]["content"][1]["source"]["media_type"], "image/png");
        assert_eq!(body["messages"][1]["content"][0]["type"], "tool_use");
        assert_eq!(body["messages"][2]["content"][0]["tool_use_id"], "toolu_1");
        assert!(body["messages"][2]["content"][0].get("is_error").is_none());
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
    }

    #[test]
    fn empty_system_and_tools_are_omitted() {
        let request = CompletionRequest {
            model: "m".into(),
            max_tokens: 10,
            system: String::new(),
            messages: vec![],
            tools: vec![],
        };
        let body = serde_json::to_value(AnthropicProvider::build_body(&request)).unwrap();
        assert!(body.get("system").is_none());
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn parses_tool_use_stream() {
        let events: Vec<StreamEvent> = parse_all(TOOL_USE_STREAM)
            .into_iter()
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta { index: 0, text: "Let me ".into() },
                StreamEvent::TextDelta { index: 0, text: "check.".into() },
                StreamEvent::BlockStop { index: 0 },
                StreamEvent::ToolUseStart {
                    index: 1,
                    id: "toolu_01".into(),
                    name: "lookup_user".into(),
                },
                StreamEvent::ToolInputDelta { index: 1, partial_json: r#"{"username":"#.into() },
                StreamEvent::ToolInputDelta { index: 1, partial_json: r#""ann"}"#.into() },
                StreamEvent::BlockStop { index: 1 },
                StreamEvent::MessageStop { stop_reason: Some("tool_use".into()) },
            ]
        );
    }

    #[test]
    fn parser_handles_lines_split_across_chunks() {
        let mut parser = SseParser::default();
        let line = "data: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"héllo\"}}\n";
        let bytes = line.as_bytes();
        // Split inside the two-byte 'é'
        let split = line.find('é').unwrap() + 1;
        assert!(parser.push(&bytes[..split]).is_empty());
        let events = parser.push(&bytes[split..]);
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].as_ref().unwrap(),
            &StreamEvent::TextDelta { index: 0, text: "héllo".into() }
        );
    }

    #[test]
    fn error_event_becomes_stream_interrupted() {
        let events = parse_all(
            "event: error\ndata: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\n\n",
        );
        assert_eq!(events.len(), 1);
        match &events[0] {
            Err(ProviderError::StreamInterrupted(msg)) => {
                assert!(msg.contains("overloaded_error"));
                assert!(msg.contains("Overloaded"));
            }
            other => panic!("expected StreamInterrupted, got {other:?}"),
        }
    }

    #[test]
    fn garbage_lines_are_ignored() {
        let events = parse_all(": keep-alive\ndata: not json\n\ndata: {\"type\":\"ping\"}\n");
        assert!(events.is_empty());
    }

    fn simple_request() -> CompletionRequest {
        CompletionRequest {
            model: "claude-sonnet-4-20250514".into(),
            max_tokens: 64,
            system: "sys".into(),
            messages: vec![WireMessage {
                role: WireRole::User,
                content: vec![ContentBlock::text("hi")],
            }],
            tools: vec![],
        }
    }

    #[tokio::test]
    async fn streams_events_over_http() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-ant-test")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "stream": true,
                "system": "sys",
            })))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(TOOL_USE_STREAM)
            .create_async()
            .await;

        let provider = AnthropicProvider::new("sk-ant-test").with_base_url(server.url());
        let mut rx = provider.begin_stream(simple_request()).await.unwrap();

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev.unwrap());
        }
        mock.assert_async().await;

        assert_eq!(events.len(), 8);
        assert!(matches!(events.last(), Some(StreamEvent::MessageStop { .. })));
    }

    #[tokio::test]
    async fn unauthorized_maps_to_authentication_failed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(401)
            .with_body(r#"{"type":"error","error":{"type":"authentication_error"}}"#)
            .create_async()
            .await;

        let provider = AnthropicProvider::new("bad-key").with_base_url(server.url());
        let err = provider.begin_stream(simple_request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn server_error_maps_to_api_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body("overloaded")
            .create_async()
            .await;

        let provider = AnthropicProvider::new("sk-ant-test").with_base_url(server.url());
        match provider.begin_stream(simple_request()).await.unwrap_err() {
            ProviderError::ApiError { status_code, message } => {
                assert_eq!(status_code, 529);
                assert_eq!(message, "overloaded");
            }
            other => panic!("expected ApiError, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_reads_retry_after() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/messages")
            .with_status(429)
            .with_header("retry-after", "12")
            .create_async()
            .await;

        let provider = AnthropicProvider::new("sk-ant-test").with_base_url(server.url());
        let err = provider.begin_stream(simple_request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited { retry_after_secs: 12 }));
    }
}
