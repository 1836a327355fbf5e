use serde::{Deserialize, Serialize};

use crate::types::{ToolError, ToolOutcome};

/// Token usage accumulated over an execution.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    pub fn add(&mut self, prompt_tokens: u64, completion_tokens: u64) {
        self.prompt_tokens += prompt_tokens;
        self.completion_tokens += completion_tokens;
        self.total_tokens = self.prompt_tokens + self.completion_tokens;
    }
}

/// Why a successful execution stopped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    /// The tool-round budget ran out while the model still requested tools.
    ToolCalls,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Error,
}

/// The fixed event vocabulary visible to callers.
///
/// Serialized untagged: the variant travels in the frame's `event:` line
/// (see [`CanonicalEvent::event_name`]) and only the fields go in `data:`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum CanonicalEvent {
    Thinking {
        msg: String,
    },
    ToolStart {
        tool_name: String,
        args: serde_json::Value,
    },
    ToolResult {
        tool_name: String,
        status: ToolStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        result: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error_detail: Option<ToolError>,
    },
    MessageChunk {
        content: String,
    },
    Done {
        usage: Usage,
        finish_reason: FinishReason,
    },
    Error {
        code: u16,
        msg: String,
    },
}

impl CanonicalEvent {
    pub fn thinking(msg: impl Into<String>) -> Self {
        Self::Thinking { msg: msg.into() }
    }

    pub fn chunk(content: impl Into<String>) -> Self {
        Self::MessageChunk {
            content: content.into(),
        }
    }

    pub fn error(code: u16, msg: impl Into<String>) -> Self {
        Self::Error {
            code,
            msg: msg.into(),
        }
    }

    pub fn tool_result(tool_name: impl Into<String>, outcome: &ToolOutcome) -> Self {
        let tool_name = tool_name.into();
        match outcome {
            ToolOutcome::Success { preview, .. } => Self::ToolResult {
                tool_name,
                status: ToolStatus::Success,
                result: Some(preview.clone()),
                error_detail: None,
            },
            ToolOutcome::Error(e) => Self::ToolResult {
                tool_name,
                status: ToolStatus::Error,
                result: None,
                error_detail: Some(e.clone()),
            },
        }
    }

    /// Wire event type name.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Thinking { .. } => "tool_thinking",
            Self::ToolStart { .. } => "tool_start",
            Self::ToolResult { .. } => "tool_result",
            Self::MessageChunk { .. } => "message_chunk",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }

    /// JSON payload for the `data:` line, stamped with the trace id.
    pub fn to_payload(&self, trace_id: &str) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}));
        if let serde_json::Value::Object(map) = &mut value {
            map.insert(
                "trace_id".to_string(),
                serde_json::Value::String(trace_id.to_string()),
            );
        }
        value
    }
}
