use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use spotlight_core::config::ToolsConfig;
use spotlight_core::error::{Result, SpotlightError};
use spotlight_core::payload::{ToolConfig, Vault};
use spotlight_core::traits::NativeTool;
use spotlight_core::types::{ToolContext, ToolDefinition, ToolErrorKind, ToolOutcome};

use crate::http::HttpTool;
use crate::preview::bounded_preview;
use crate::registry::NativeToolRegistry;

/// Turns per-request tool configs into a [`ToolSet`].
///
/// Holds the process-wide pieces: the native registry and the shared HTTP
/// connection pool.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<NativeToolRegistry>,
    http: reqwest::Client,
    config: ToolsConfig,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<NativeToolRegistry>, config: ToolsConfig) -> Self {
        Self {
            registry,
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn registry(&self) -> &NativeToolRegistry {
        &self.registry
    }

    /// Resolve every configured tool. Fails before anything runs if a tool
    /// is unknown or malformed, or a name repeats.
    pub fn resolve(&self, tools: &[ToolConfig], vault: Arc<Vault>) -> Result<ToolSet> {
        let mut set = ToolSet::empty(self.config.preview_max_chars);

        for tool_config in tools {
            let name = tool_config.name();
            if name.trim().is_empty() {
                return Err(SpotlightError::Config("tool name must not be empty".into()));
            }
            if set.index.contains_key(name) {
                return Err(SpotlightError::Config(format!("duplicate tool name '{}'", name)));
            }

            let resolved = match tool_config {
                ToolConfig::Native { name } => {
                    let tool = self
                        .registry
                        .get(name)
                        .ok_or_else(|| SpotlightError::UnknownTool(name.clone()))?;
                    ResolvedTool::Native(tool)
                }
                ToolConfig::Http {
                    name,
                    description,
                    parameter_schema,
                    execution_config,
                } => ResolvedTool::Http(HttpTool::from_config(
                    name,
                    description.as_deref(),
                    parameter_schema,
                    execution_config,
                    vault.clone(),
                    self.http.clone(),
                    &self.config,
                )?),
            };

            set.push(name.to_string(), resolved);
        }

        info!(tools = set.len(), vault_entries = vault.len(), "Resolved tool set");
        Ok(set)
    }
}

enum ResolvedTool {
    Native(Arc<dyn NativeTool>),
    Http(HttpTool),
}

/// The tools available to one execution, keyed by name.
pub struct ToolSet {
    tools: Vec<(String, ResolvedTool)>,
    index: HashMap<String, usize>,
    preview_max_chars: usize,
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.tools.iter().map(|(name, _)| name).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ToolSet {
    pub fn empty(preview_max_chars: usize) -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
            preview_max_chars,
        }
    }

    fn push(&mut self, name: String, tool: ResolvedTool) {
        self.index.insert(name.clone(), self.tools.len());
        self.tools.push((name, tool));
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Tool specs sent to the model, in configuration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|(name, tool)| match tool {
                ResolvedTool::Native(t) => ToolDefinition {
                    name: name.clone(),
                    description: t.description().to_string(),
                    input_schema: t.input_schema(),
                },
                ResolvedTool::Http(t) => t.definition(),
            })
            .collect()
    }

    /// Invoke a tool by name. Never fails: every problem becomes an error
    /// outcome the model can see.
    pub async fn invoke(&self, name: &str, args: serde_json::Value, ctx: ToolContext) -> ToolOutcome {
        let Some(&idx) = self.index.get(name) else {
            warn!(tool = %name, "Model requested a tool that is not configured");
            return ToolOutcome::error(
                ToolErrorKind::UnknownTool,
                format!("tool '{}' is not available", name),
            );
        };

        match &self.tools[idx].1 {
            ResolvedTool::Http(tool) => tool.invoke(args).await,
            ResolvedTool::Native(tool) => self.invoke_native(name, tool.as_ref(), args, ctx).await,
        }
    }

    async fn invoke_native(
        &self,
        name: &str,
        tool: &dyn NativeTool,
        args: serde_json::Value,
        ctx: ToolContext,
    ) -> ToolOutcome {
        let timeout = Duration::from_secs(tool.timeout_secs());
        let outcome = match tokio::time::timeout(timeout, tool.execute(args, ctx)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(SpotlightError::ToolValidation(msg))) => ToolOutcome::error(
                ToolErrorKind::InvalidArguments,
                format!("tool '{}': invalid arguments: {}", name, msg),
            ),
            Ok(Err(e)) => {
                warn!(tool = %name, error = %e, "Native tool failed");
                ToolOutcome::error(ToolErrorKind::Execution, format!("tool '{}' failed", name))
            }
            Err(_) => ToolOutcome::error(
                ToolErrorKind::Timeout,
                format!("tool '{}' timed out after {}s", name, timeout.as_secs()),
            ),
        };

        match outcome {
            ToolOutcome::Success { preview, truncated } => {
                let (preview, cut) = bounded_preview(&preview, self.preview_max_chars);
                ToolOutcome::Success {
                    preview,
                    truncated: truncated || cut,
                }
            }
            error => error,
        }
    }
}
