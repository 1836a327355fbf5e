use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpotlightError};

/// Process-wide engine settings. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub model: ModelDefaults,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String { "0.0.0.0:8000".to_string() }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Idle interval before a keepalive comment is written.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            keepalive_secs: default_keepalive_secs(),
        }
    }
}

fn default_keepalive_secs() -> u64 { 30 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Default timeout for HTTP tools without their own `timeout_secs`.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Tool results longer than this are truncated before reaching the model.
    #[serde(default = "default_preview_max_chars")]
    pub preview_max_chars: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout_secs(),
            preview_max_chars: default_preview_max_chars(),
        }
    }
}

fn default_http_timeout_secs() -> u64 { 30 }
fn default_preview_max_chars() -> usize { 4_000 }

/// Engine-side model settings; the endpoint and credential come per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDefaults {
    /// Idle timeout between stream items from the model backend.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ModelDefaults {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

fn default_request_timeout_secs() -> u64 { 120 }

/// Retry configuration for model requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 2 }
fn default_initial_backoff() -> u64 { 500 }
fn default_max_backoff() -> u64 { 8_000 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Upper bound on llm → tools → llm rounds per execution.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

fn default_max_tool_rounds() -> usize { 5 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String { "info".to_string() }

impl EngineConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SpotlightError::ConfigNotFound(path.display().to_string()),
            _ => SpotlightError::Io(e),
        })?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| SpotlightError::Config(e.to_string()))
    }

    /// Like [`EngineConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Apply the process environment on top of the file settings.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log.level = level.trim().to_lowercase();
        }
        if let Some(secs) = lookup("SSE_KEEPALIVE_INTERVAL") {
            self.stream.keepalive_secs = parse_secs("SSE_KEEPALIVE_INTERVAL", &secs)?;
        }
        if let Some(secs) = lookup("HTTP_TOOL_TIMEOUT") {
            self.tools.http_timeout_secs = parse_secs("HTTP_TOOL_TIMEOUT", &secs)?;
        }
        if let Some(bind) = lookup("SPOTLIGHT_BIND") {
            self.server.bind = bind;
        }
        self.validate()
    }

    /// Reject settings the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.stream.keepalive_secs == 0 {
            return Err(SpotlightError::Config(
                "stream.keepalive_secs must be greater than 0".into(),
            ));
        }
        if self.tools.http_timeout_secs == 0 {
            return Err(SpotlightError::Config(
                "tools.http_timeout_secs must be greater than 0".into(),
            ));
        }
        if self.workflow.max_tool_rounds == 0 {
            return Err(SpotlightError::Config(
                "workflow.max_tool_rounds must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

fn parse_secs(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| SpotlightError::Config(format!("{} must be a whole number of seconds", name)))
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}
