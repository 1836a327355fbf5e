use serde::{Deserialize, Deserializer, Serialize};

/// Role in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Tool => "tool",
        }
    }
}

/// A chat message in the conversation.
///
/// `content` is either a plain string or a structured (multimodal) array and
/// is forwarded to the model untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    fn with_text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: serde_json::Value::String(text.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::with_text(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::with_text(Role::User, text)
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::with_text(Role::Assistant, text)
    }

    pub fn assistant_tool_calls(text: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::with_text(Role::Assistant, text)
        }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
            ..Self::with_text(Role::Tool, content)
        }
    }

    /// Extract the text content of this message. Structured content yields
    /// the concatenation of its `text` parts.
    pub fn text(&self) -> String {
        match &self.content {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(parts) => parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join(""),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Short description of the content shape, used for diagnostics.
    pub fn content_kind(&self) -> String {
        match &self.content {
            serde_json::Value::Null => "empty".to_string(),
            serde_json::Value::String(_) => "text".to_string(),
            serde_json::Value::Array(parts) => {
                let kinds: Vec<&str> = parts
                    .iter()
                    .map(|p| p.get("type").and_then(|t| t.as_str()).unwrap_or("unknown"))
                    .collect();
                format!("multimodal[{}]", kinds.join(", "))
            }
            serde_json::Value::Object(_) => "object".to_string(),
            _ => "scalar".to_string(),
        }
    }
}

/// A tool call requested by the model, in OpenAI wire shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionCall {
    #[serde(default)]
    pub name: String,
    /// Raw JSON arguments as produced by the model.
    #[serde(default, deserialize_with = "arguments_as_string")]
    pub arguments: String,
}

fn default_call_type() -> String {
    "function".to_string()
}

/// Accept arguments either as the usual JSON string or as an inline object.
fn arguments_as_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: default_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// Parse the raw arguments into a JSON object. Empty arguments are `{}`.
    pub fn parse_arguments(&self) -> std::result::Result<serde_json::Value, String> {
        let raw = self.function.arguments.trim();
        if raw.is_empty() {
            return Ok(serde_json::json!({}));
        }
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(v) if v.is_object() => Ok(v),
            Ok(_) => Err("tool arguments must be a JSON object".to_string()),
            Err(_) => Err("tool arguments are not valid JSON".to_string()),
        }
    }
}

/// Stop reason from the LLM.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    ToolUse,
    MaxTokens,
    StopSequence,
}

/// A streaming delta from the LLM provider.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamDelta {
    /// A chunk of text content.
    TextDelta(String),

    /// A chunk of reasoning content.
    ThinkingDelta(String),

    /// Start of a tool call.
    ToolUseStart {
        index: usize,
        id: String,
        name: String,
    },

    /// A chunk of tool call argument JSON.
    ToolInputDelta { index: usize, delta: String },

    /// The response is complete.
    Stop(StopReason),

    /// Usage information.
    Usage {
        input_tokens: u64,
        output_tokens: u64,
    },
}

/// Tool definition for sending to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Classification of a failed tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolErrorKind {
    InvalidArguments,
    SecretMissing,
    Timeout,
    Transport,
    UpstreamStatus { status_code: u16 },
    UnknownTool,
    Execution,
}

/// Error detail of a failed tool call. `message` never contains secret values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolError {
    #[serde(flatten)]
    pub kind: ToolErrorKind,
    pub message: String,
}

/// Normalized result of a tool invocation, shared by native and remote tools.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success { preview: String, truncated: bool },
    Error(ToolError),
}

impl ToolOutcome {
    pub fn success(preview: impl Into<String>) -> Self {
        Self::Success {
            preview: preview.into(),
            truncated: false,
        }
    }

    pub fn error(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self::Error(ToolError {
            kind,
            message: message.into(),
        })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Text handed back to the model as the tool message content.
    pub fn content_for_model(&self) -> String {
        match self {
            Self::Success { preview, .. } => preview.clone(),
            Self::Error(e) => format!("Error: {}", e.message),
        }
    }
}

/// Context passed to native tools during execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub trace_id: String,
    pub user_id: String,
}
