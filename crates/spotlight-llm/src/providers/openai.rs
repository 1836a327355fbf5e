use std::time::Duration;

use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use spotlight_core::error::{Result, SpotlightError};
use spotlight_core::logging::{sanitize, LOG_VALUE_MAX_CHARS};
use spotlight_core::payload::ModelConfig;
use spotlight_core::traits::LlmClient;
use spotlight_core::types::*;

use crate::streaming::{SseEvent, SseStream};

const CHAT_COMPLETIONS_PATH: &str = "/chat/completions";

/// OpenAI-compatible client. Works with OpenAI, Ollama, vLLM, Groq, OpenRouter, etc.
pub struct OpenAiClient {
    http: Client,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self::with_connect_timeout(Duration::from_secs(10))
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        let http = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { http }
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve the completions endpoint from a configured base URL.
pub fn chat_completions_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    if trimmed.ends_with(CHAT_COMPLETIONS_PATH) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, CHAT_COMPLETIONS_PATH)
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OaiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f32,
    stream: bool,
    stream_options: StreamOptions,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OaiTool>,
}

#[derive(Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Serialize, Debug)]
pub(crate) struct OaiMessage {
    role: String,
    content: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OaiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct OaiToolCall {
    #[serde(default)]
    index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    r#type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function: Option<OaiFunction>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub(crate) struct OaiFunction {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    arguments: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct OaiTool {
    r#type: String,
    function: OaiToolDef,
}

#[derive(Serialize)]
pub(crate) struct OaiToolDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

// Response types
#[derive(Deserialize, Debug)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
    #[serde(default)]
    usage: Option<StreamUsage>,
}

#[derive(Deserialize, Debug)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDeltaContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct StreamDeltaContent {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<OaiToolCall>>,
}

#[derive(Deserialize, Debug)]
struct StreamUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

pub(crate) fn convert_tools(tools: &[ToolDefinition]) -> Vec<OaiTool> {
    tools
        .iter()
        .map(|t| OaiTool {
            r#type: "function".to_string(),
            function: OaiToolDef {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.input_schema.clone(),
            },
        })
        .collect()
}

/// Map conversation history to OpenAI messages. Structured content is passed
/// through untouched.
pub(crate) fn convert_messages(messages: Vec<ChatMessage>) -> Vec<OaiMessage> {
    messages
        .into_iter()
        .enumerate()
        .map(|(idx, msg)| {
            if !msg.content.is_string() && !msg.content.is_null() {
                debug!(
                    index = idx,
                    role = msg.role.as_str(),
                    content = %msg.content_kind(),
                    "Message carries structured content"
                );
            }

            let content = match msg.content {
                serde_json::Value::Null => serde_json::Value::String(String::new()),
                // Tool results must be plain text
                other if msg.role == Role::Tool && !other.is_string() => {
                    serde_json::Value::String(other.to_string())
                }
                other => other,
            };

            let tool_calls = if msg.role == Role::Assistant && !msg.tool_calls.is_empty() {
                Some(
                    msg.tool_calls
                        .into_iter()
                        .enumerate()
                        .map(|(i, call)| OaiToolCall {
                            index: i,
                            id: Some(call.id),
                            r#type: Some(call.call_type),
                            function: Some(OaiFunction {
                                name: Some(call.function.name),
                                arguments: Some(call.function.arguments),
                            }),
                        })
                        .collect(),
                )
            } else {
                None
            };

            let tool_call_id = if msg.role == Role::Tool {
                Some(msg.tool_call_id.unwrap_or_default())
            } else {
                None
            };

            OaiMessage {
                role: msg.role.as_str().to_string(),
                content,
                tool_calls,
                tool_call_id,
            }
        })
        .collect()
}

fn is_done_marker(event: &SseEvent) -> bool {
    event.data.trim() == "[DONE]"
}

pub(crate) fn parse_chunk(event: SseEvent) -> Vec<Result<StreamDelta>> {
    if is_done_marker(&event) {
        return vec![];
    }

    let parsed: std::result::Result<StreamChunk, _> = serde_json::from_str(&event.data);
    match parsed {
        Ok(chunk) => {
            if let Some(error) = chunk.error {
                let message = error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| error.to_string());
                return vec![Err(SpotlightError::ModelBackend(format!(
                    "upstream error: {}",
                    sanitize(&message, LOG_VALUE_MAX_CHARS)
                )))];
            }

            let mut deltas = Vec::new();

            for choice in chunk.choices.into_iter().take(1) {
                if let Some(delta) = choice.delta {
                    if let Some(reasoning) = delta.reasoning_content {
                        if !reasoning.is_empty() {
                            deltas.push(Ok(StreamDelta::ThinkingDelta(reasoning)));
                        }
                    }

                    if let Some(text) = delta.content {
                        if !text.is_empty() {
                            deltas.push(Ok(StreamDelta::TextDelta(text)));
                        }
                    }

                    // Some providers send name + arguments in the same chunk
                    if let Some(tool_calls) = delta.tool_calls {
                        for tc in tool_calls {
                            if let Some(func) = tc.function {
                                if let Some(name) = func.name {
                                    deltas.push(Ok(StreamDelta::ToolUseStart {
                                        index: tc.index,
                                        id: tc.id.unwrap_or_default(),
                                        name,
                                    }));
                                }
                                if let Some(args) = func.arguments {
                                    deltas.push(Ok(StreamDelta::ToolInputDelta {
                                        index: tc.index,
                                        delta: args,
                                    }));
                                }
                            }
                        }
                    }
                }

                if let Some(reason) = choice.finish_reason {
                    let stop = match reason.as_str() {
                        "stop" => StopReason::EndTurn,
                        "tool_calls" | "function_call" => StopReason::ToolUse,
                        "length" => StopReason::MaxTokens,
                        _ => StopReason::EndTurn,
                    };
                    deltas.push(Ok(StreamDelta::Stop(stop)));
                }
            }

            if let Some(usage) = chunk.usage {
                deltas.push(Ok(StreamDelta::Usage {
                    input_tokens: usage.prompt_tokens,
                    output_tokens: usage.completion_tokens,
                }));
            }

            deltas
        }
        Err(e) => {
            warn!(
                data = %sanitize(&event.data, LOG_VALUE_MAX_CHARS),
                error = %e,
                "Failed to parse OpenAI SSE chunk"
            );
            vec![]
        }
    }
}

impl LlmClient for OpenAiClient {
    fn chat_stream(
        &self,
        config: &ModelConfig,
        messages: Vec<ChatMessage>,
        tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        let config = config.clone();
        let tools = tools.to_vec();

        Box::pin(async move {
            let url = chat_completions_url(&config.base_url);

            let body = ChatRequest {
                model: config.model_name.clone(),
                messages: convert_messages(messages),
                max_tokens: config.max_tokens,
                temperature: config.temperature,
                stream: true,
                stream_options: StreamOptions {
                    include_usage: true,
                },
                tools: convert_tools(&tools),
            };

            let response = self
                .http
                .post(&url)
                .bearer_auth(&config.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| SpotlightError::ModelBackend(describe_send_error(e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "unknown".to_string());
                return Err(SpotlightError::ModelBackend(format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    sanitize(&body, LOG_VALUE_MAX_CHARS)
                )));
            }

            let mut sse_stream = SseStream::new(response.bytes_stream());

            // Only `[DONE]` or a finish reason marks a complete turn; a body
            // that just stops is a failure.
            let delta_stream = async_stream::stream! {
                let mut completed = false;
                while let Some(event) = sse_stream.next().await {
                    let event = match event {
                        Ok(event) => event,
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    };
                    if is_done_marker(&event) {
                        completed = true;
                        break;
                    }
                    for delta in parse_chunk(event) {
                        match delta {
                            Ok(delta) => {
                                if matches!(delta, StreamDelta::Stop(_)) {
                                    completed = true;
                                }
                                yield Ok(delta);
                            }
                            Err(e) => {
                                warn!(error = %e, "Model stream reported an error");
                                yield Err(e);
                                return;
                            }
                        }
                    }
                }
                if !completed {
                    warn!("Model stream closed before completion");
                    yield Err(SpotlightError::ModelBackend(
                        "stream ended before completion".into(),
                    ));
                }
            };

            Ok(Box::pin(delta_stream) as BoxStream<'_, Result<StreamDelta>>)
        })
    }
}

/// Describe a send failure without the request URL, which may carry a key.
fn describe_send_error(e: reqwest::Error) -> String {
    if e.is_connect() {
        "connection failed".to_string()
    } else if e.is_timeout() {
        "request timeout".to_string()
    } else {
        format!("request failed: {}", e.without_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse(data: &str) -> SseEvent {
        SseEvent {
            event_type: None,
            data: data.to_string(),
        }
    }

    #[test]
    fn test_chat_completions_url() {
        assert_eq!(
            chat_completions_url("https://api.example.com/v1"),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            chat_completions_url("https://api.example.com/v1/"),
            "https://api.example.com/v1/chat/completions"
        );
        assert_eq!(
            chat_completions_url("http://localhost:11434/v1/chat/completions"),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_parse_text_and_finish_in_one_chunk() {
        let deltas = parse_chunk(sse(
            r#"{"choices":[{"delta":{"content":"2"},"finish_reason":"stop"}]}"#,
        ));
        let deltas: Vec<_> = deltas.into_iter().map(|d| d.unwrap()).collect();
        assert_eq!(
            deltas,
            vec![
                StreamDelta::TextDelta("2".into()),
                StreamDelta::Stop(StopReason::EndTurn)
            ]
        );
    }

    #[test]
    fn test_parse_usage_only_chunk() {
        let deltas = parse_chunk(sse(
            r#"{"choices":[],"usage":{"prompt_tokens":9,"completion_tokens":3,"total_tokens":12}}"#,
        ));
        assert_eq!(deltas.len(), 1);
        assert_eq!(
            deltas[0].as_ref().unwrap(),
            &StreamDelta::Usage {
                input_tokens: 9,
                output_tokens: 3
            }
        );
    }

    #[test]
    fn test_parse_reasoning_and_tool_call() {
        let deltas = parse_chunk(sse(
            r#"{"choices":[{"delta":{"reasoning_content":"hmm","tool_calls":[{"index":0,"id":"call_1","function":{"name":"weather","arguments":"{\"city\""}}]}}]}"#,
        ));
        let deltas: Vec<_> = deltas.into_iter().map(|d| d.unwrap()).collect();
        assert_eq!(deltas[0], StreamDelta::ThinkingDelta("hmm".into()));
        assert_eq!(
            deltas[1],
            StreamDelta::ToolUseStart {
                index: 0,
                id: "call_1".into(),
                name: "weather".into()
            }
        );
        assert_eq!(
            deltas[2],
            StreamDelta::ToolInputDelta {
                index: 0,
                delta: "{\"city\"".into()
            }
        );
    }

    #[test]
    fn test_done_marker_and_garbage_are_skipped() {
        assert!(parse_chunk(sse("[DONE]")).is_empty());
        assert!(parse_chunk(sse("not json")).is_empty());
    }

    #[test]
    fn test_error_chunk_is_backend_error() {
        let deltas = parse_chunk(sse(r#"{"error":{"message":"upstream overloaded","type":"server_error"}}"#));
        assert_eq!(deltas.len(), 1);
        match &deltas[0] {
            Err(SpotlightError::ModelBackend(msg)) => assert!(msg.contains("upstream overloaded")),
            other => panic!("expected backend error, got {:?}", other),
        }
    }

    async fn stream_body(body: &str) -> Vec<Result<StreamDelta>> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/event-stream"))
            .mount(&server)
            .await;

        let config: ModelConfig = serde_json::from_value(serde_json::json!({
            "model_name": "gpt-4o-mini",
            "base_url": format!("{}/v1", server.uri()),
            "api_key": "sk-test"
        }))
        .unwrap();
        let client = OpenAiClient::new();
        let stream = client
            .chat_stream(&config, vec![ChatMessage::user("hi")], &[])
            .await
            .unwrap();
        stream.collect().await
    }

    const PARTIAL: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n\n";

    #[tokio::test]
    async fn test_complete_stream_ends_with_stop() {
        let body = format!(
            "{}data: {{\"choices\":[{{\"delta\":{{}},\"finish_reason\":\"stop\"}}]}}\n\ndata: [DONE]\n\n",
            PARTIAL
        );
        let deltas: Vec<_> = stream_body(&body).await.into_iter().map(|d| d.unwrap()).collect();
        assert_eq!(
            deltas,
            vec![
                StreamDelta::TextDelta("par".into()),
                StreamDelta::Stop(StopReason::EndTurn)
            ]
        );
    }

    #[tokio::test]
    async fn test_done_without_finish_reason_ends_cleanly() {
        let body = format!("{}data: [DONE]\n\n", PARTIAL);
        let deltas = stream_body(&body).await;
        assert_eq!(deltas.len(), 1);
        assert!(deltas[0].is_ok());
    }

    #[tokio::test]
    async fn test_midstream_error_chunk_ends_with_error() {
        let body = format!(
            "{}data: {{\"error\":{{\"message\":\"upstream overloaded\"}}}}\n\n",
            PARTIAL
        );
        let deltas = stream_body(&body).await;
        assert_eq!(deltas.len(), 2);
        assert!(matches!(deltas[0], Ok(StreamDelta::TextDelta(_))));
        assert!(matches!(deltas[1], Err(SpotlightError::ModelBackend(_))));
    }

    #[tokio::test]
    async fn test_truncated_stream_ends_with_error() {
        let deltas = stream_body(PARTIAL).await;
        assert_eq!(deltas.len(), 2);
        assert!(matches!(deltas[0], Ok(StreamDelta::TextDelta(_))));
        match &deltas[1] {
            Err(SpotlightError::ModelBackend(msg)) => assert_eq!(msg, "stream ended before completion"),
            other => panic!("expected backend error, got {:?}", other),
        }
    }

    #[test]
    fn test_convert_messages_keeps_history_shape() {
        let image = serde_json::json!([
            {"type": "text", "text": "what is this"},
            {"type": "image_url", "image_url": {"url": "https://x/y.png"}}
        ]);
        let mut user = ChatMessage::user("");
        user.content = image.clone();
        let messages = vec![
            ChatMessage::system("be brief"),
            user,
            ChatMessage::assistant_tool_calls(
                "",
                vec![ToolCall::new("call_1", "weather", r#"{"city":"Paris"}"#)],
            ),
            ChatMessage::tool_result("call_1", "weather", r#"{"temp":20}"#),
        ];
        let converted = convert_messages(messages);
        let json = serde_json::to_value(&converted).unwrap();
        assert_eq!(json[1]["content"], image);
        assert_eq!(json[2]["tool_calls"][0]["function"]["name"], "weather");
        assert_eq!(json[3]["role"], "tool");
        assert_eq!(json[3]["tool_call_id"], "call_1");
        assert!(json[0].get("tool_call_id").is_none());
    }
}
