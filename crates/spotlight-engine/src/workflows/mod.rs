//! Static registry of the workflows this engine can run.

pub mod agent_chat;

use std::collections::BTreeMap;
use std::sync::Arc;

use spotlight_core::types::ToolContext;
use spotlight_llm::ModelClient;
use spotlight_tools::ToolSet;

use crate::graph::GraphExecutor;

/// Everything a workflow needs to assemble its graph for one execution.
#[derive(Clone)]
pub struct WorkflowContext {
    pub model: ModelClient,
    pub tools: Arc<ToolSet>,
    pub tool_context: ToolContext,
    pub max_tool_rounds: usize,
}

/// Builds a fresh graph for one execution.
pub type WorkflowBuilder = fn(WorkflowContext) -> GraphExecutor;

/// Workflow id → graph builder. Read-only after startup.
#[derive(Clone, Default)]
pub struct WorkflowRegistry {
    builders: BTreeMap<String, WorkflowBuilder>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every workflow shipped with the engine.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(agent_chat::WORKFLOW_ID, agent_chat::build);
        registry
    }

    pub fn register(&mut self, id: impl Into<String>, builder: WorkflowBuilder) {
        self.builders.insert(id.into(), builder);
    }

    pub fn get(&self, id: &str) -> Option<WorkflowBuilder> {
        self.builders.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.builders.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.builders.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_workflows() {
        let registry = WorkflowRegistry::builtin();
        assert!(registry.contains("agent_chat"));
        assert!(registry.get("agent_chat").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.ids(), vec!["agent_chat".to_string()]);
    }
}
