use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{BoxStream, StreamExt};
use reqwest::header::HeaderValue;
use tracing::{debug, warn};

use spotlight_core::config::EngineConfig;
use spotlight_core::error::{Result, SpotlightError};
use spotlight_core::payload::ModelConfig;
use spotlight_core::traits::LlmClient;
use spotlight_core::types::*;

use crate::providers::OpenAiClient;
use crate::retry::RetryingClient;

/// One item of a model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelEvent {
    TextDelta(String),
    ReasoningDelta(String),
    /// A fully assembled tool call request.
    ToolCall(ToolCall),
    Usage {
        prompt_tokens: u64,
        completion_tokens: u64,
    },
    /// Normal end of the turn. Always the last item of a successful turn.
    Finished(StopReason),
}

#[derive(Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    input_json: String,
}

/// Per-request model client: the backend plus the request's model settings.
///
/// Holds the credential for the lifetime of one execution only.
#[derive(Clone)]
pub struct ModelClient {
    config: Arc<ModelConfig>,
    llm: Arc<dyn LlmClient>,
    idle_timeout: Duration,
}

impl std::fmt::Debug for ModelClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClient")
            .field("config", &self.config)
            .field("idle_timeout", &self.idle_timeout)
            .finish()
    }
}

impl ModelClient {
    /// Build the OpenAI-compatible client with retries from engine settings.
    pub fn new(config: ModelConfig, engine: &EngineConfig) -> Result<Self> {
        let llm = RetryingClient::new(
            Box::new(OpenAiClient::new()),
            engine.model.retry.clone(),
        );
        Self::with_backend(
            config,
            Arc::new(llm),
            Duration::from_secs(engine.model.request_timeout_secs),
        )
    }

    /// Build on an arbitrary backend; the model settings are still validated.
    pub fn with_backend(
        config: ModelConfig,
        llm: Arc<dyn LlmClient>,
        idle_timeout: Duration,
    ) -> Result<Self> {
        validate_model_config(&config)?;
        Ok(Self {
            config: Arc::new(config),
            llm,
            idle_timeout,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Start one model turn.
    ///
    /// The sequence is lazy: nothing is sent until it is first polled, and
    /// dropping it aborts the in-flight request. It ends either with
    /// `Finished` or with a single `Err`.
    pub fn stream(
        &self,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
    ) -> BoxStream<'static, Result<ModelEvent>> {
        let llm = self.llm.clone();
        let config = self.config.clone();
        let idle = self.idle_timeout;

        Box::pin(async_stream::stream! {
            debug!(
                model = %config.model_name,
                messages = messages.len(),
                tools = tools.len(),
                "Starting model turn"
            );

            let opened = tokio::time::timeout(idle, llm.chat_stream(&config, messages, &tools)).await;
            let mut deltas = match opened {
                Ok(Ok(deltas)) => deltas,
                Ok(Err(e)) => {
                    yield Err(into_backend_error(e));
                    return;
                }
                Err(_) => {
                    yield Err(SpotlightError::ModelTimeout(idle.as_secs()));
                    return;
                }
            };

            let mut calls: BTreeMap<usize, ToolCallAccumulator> = BTreeMap::new();
            let mut stop_reason = None;

            loop {
                let next = match tokio::time::timeout(idle, deltas.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        yield Err(SpotlightError::ModelTimeout(idle.as_secs()));
                        return;
                    }
                };
                let delta = match next {
                    Some(Ok(delta)) => delta,
                    Some(Err(e)) => {
                        yield Err(into_backend_error(e));
                        return;
                    }
                    None => break,
                };
                match delta {
                    StreamDelta::TextDelta(text) => {
                        yield Ok(ModelEvent::TextDelta(text));
                    }
                    StreamDelta::ThinkingDelta(text) => {
                        yield Ok(ModelEvent::ReasoningDelta(text));
                    }
                    StreamDelta::ToolUseStart { index, id, name } => {
                        let call = calls.entry(index).or_default();
                        if !id.is_empty() {
                            call.id = id;
                        }
                        call.name = name;
                    }
                    StreamDelta::ToolInputDelta { index, delta } => {
                        calls.entry(index).or_default().input_json.push_str(&delta);
                    }
                    StreamDelta::Usage { input_tokens, output_tokens } => {
                        yield Ok(ModelEvent::Usage {
                            prompt_tokens: input_tokens,
                            completion_tokens: output_tokens,
                        });
                    }
                    StreamDelta::Stop(reason) => stop_reason = Some(reason),
                }
            }

            let has_calls = !calls.is_empty();
            for (index, call) in calls {
                let id = if call.id.is_empty() {
                    format!("call_{}", index)
                } else {
                    call.id
                };
                yield Ok(ModelEvent::ToolCall(ToolCall::new(id, call.name, call.input_json)));
            }

            let reason = match stop_reason {
                Some(reason) => reason,
                None => {
                    warn!("Model stream ended without a finish reason");
                    if has_calls { StopReason::ToolUse } else { StopReason::EndTurn }
                }
            };
            yield Ok(ModelEvent::Finished(reason));
        })
    }
}

fn into_backend_error(e: SpotlightError) -> SpotlightError {
    match e {
        SpotlightError::ModelBackend(_) | SpotlightError::ModelTimeout(_) => e,
        other => SpotlightError::ModelBackend(other.to_string()),
    }
}

/// Reject endpoint or credential settings that can never work.
pub fn validate_model_config(config: &ModelConfig) -> Result<()> {
    if config.model_name.trim().is_empty() {
        return Err(SpotlightError::Config("model.model_name must not be empty".into()));
    }

    let url = reqwest::Url::parse(&config.base_url).map_err(|_| {
        SpotlightError::Config("model.base_url must be an absolute http(s) URL".into())
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(SpotlightError::Config(
            "model.base_url must be an absolute http(s) URL".into(),
        ));
    }

    if config.api_key.trim().is_empty() {
        return Err(SpotlightError::Config("model.api_key must not be empty".into()));
    }
    if HeaderValue::from_str(&format!("Bearer {}", config.api_key)).is_err() {
        return Err(SpotlightError::Config(
            "model.api_key contains characters not allowed in a header".into(),
        ));
    }

    Ok(())
}
