use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ChatMessage;

/// Execution request accepted by `POST /v1/run_workflow`.
///
/// Immutable once parsed; owned by a single execution.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionPayload {
    pub task_meta: TaskMeta,
    pub input: InputContext,
    pub runtime_config: RuntimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskMeta {
    pub workflow_id: String,
    pub trace_id: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputContext {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
    #[serde(default)]
    pub vault: Vault,
}

/// Model backend settings for one execution.
#[derive(Clone, Deserialize)]
pub struct ModelConfig {
    /// Vendor label; informational only.
    #[serde(default)]
    pub provider: Option<String>,
    pub model_name: String,
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub supports_reasoning_events: bool,
}

fn default_temperature() -> f32 {
    0.7
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model_name", &self.model_name)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("supports_reasoning_events", &self.supports_reasoning_events)
            .finish()
    }
}

/// A tool made available to the workflow for this request.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ToolConfig {
    #[serde(rename = "NATIVE")]
    Native { name: String },
    #[serde(rename = "HTTP")]
    Http {
        name: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        parameter_schema: serde_json::Value,
        #[serde(default)]
        execution_config: HttpExecutionConfig,
    },
}

impl ToolConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Native { name } | Self::Http { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Native { .. } => "NATIVE",
            Self::Http { .. } => "HTTP",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct HttpExecutionConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub auth_config: Option<AuthConfig>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Names a vault entry (`source`) and the header it is injected into (`target`).
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AuthConfig {
    pub source: String,
    pub target: String,
}

/// Request-scoped secrets. Never serialized; `Debug` shows only the count.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Vault(HashMap<String, String>);

impl Vault {
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self(entries)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vault({} entries)", self.0.len())
    }
}

impl FromIterator<(String, String)> for Vault {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> serde_json::Value {
        serde_json::json!({
            "task_meta": {"workflow_id": "agent_chat", "trace_id": "t-1", "user_id": "u-1"},
            "input": {"messages": [{"role": "user", "content": "1+1等于几？"}]},
            "runtime_config": {
                "model": {
                    "model_name": "gpt-4o-mini",
                    "base_url": "https://api.example.com/v1",
                    "api_key": "sk-secret-value"
                },
                "tools": [
                    {"type": "NATIVE", "name": "calculator"},
                    {
                        "type": "HTTP",
                        "name": "weather",
                        "description": "Look up weather",
                        "parameter_schema": {"type": "object", "properties": {"city": {"type": "string"}}},
                        "execution_config": {
                            "url": "https://weather.example.com/now",
                            "auth_config": {"source": "weather_key", "target": "X-Api-Key"}
                        }
                    }
                ],
                "vault": {"weather_key": "vault-secret-value"}
            }
        })
    }

    #[test]
    fn test_payload_parses_with_defaults() {
        let payload: ExecutionPayload = serde_json::from_value(sample()).unwrap();
        assert_eq!(payload.task_meta.workflow_id, "agent_chat");
        assert!(payload.input.variables.is_empty());
        let model = &payload.runtime_config.model;
        assert!((model.temperature - 0.7).abs() < f32::EPSILON);
        assert!(!model.supports_reasoning_events);
        assert_eq!(payload.runtime_config.tools.len(), 2);
        assert_eq!(payload.runtime_config.tools[0].kind(), "NATIVE");
        match &payload.runtime_config.tools[1] {
            ToolConfig::Http {
                execution_config, ..
            } => {
                assert_eq!(execution_config.method, "GET");
                assert_eq!(execution_config.timeout_secs, None);
            }
            other => panic!("expected HTTP tool, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_never_prints_secrets() {
        let payload: ExecutionPayload = serde_json::from_value(sample()).unwrap();
        let rendered = format!("{:?}", payload);
        assert!(!rendered.contains("sk-secret-value"));
        assert!(!rendered.contains("vault-secret-value"));
        assert!(rendered.contains("Vault(1 entries)"));
        assert_eq!(
            payload.runtime_config.vault.get("weather_key"),
            Some("vault-secret-value")
        );
    }

    #[test]
    fn test_unknown_tool_type_is_rejected() {
        let mut value = sample();
        value["runtime_config"]["tools"][0]["type"] = "GRPC".into();
        assert!(serde_json::from_value::<ExecutionPayload>(value).is_err());
    }
}
