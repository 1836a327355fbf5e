use std::collections::HashMap;
use std::sync::Arc;

use spotlight_core::traits::NativeTool;
use spotlight_core::types::ToolDefinition;

/// Registry of in-process tools, keyed by name. Read-only once serving.
pub struct NativeToolRegistry {
    tools: HashMap<String, Arc<dyn NativeTool>>,
}

impl NativeToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool.
    pub fn register(&mut self, tool: impl NativeTool) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn NativeTool>> {
        self.tools.get(name).cloned()
    }

    /// List all registered tool names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Tool definition of a registered tool.
    pub fn definition(&self, name: &str) -> Option<ToolDefinition> {
        self.tools.get(name).map(|t| ToolDefinition {
            name: t.name().to_string(),
            description: t.description().to_string(),
            input_schema: t.input_schema(),
        })
    }

    /// Create a registry with all built-in tools registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(crate::builtin::time::CurrentTimeTool);
        registry.register(crate::builtin::calculator::CalculatorTool);
        registry
    }
}

impl Default for NativeToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = NativeToolRegistry::with_builtins();
        assert_eq!(registry.list(), vec!["calculator", "current_time"]);
        let def = registry.definition("calculator").unwrap();
        assert_eq!(def.input_schema["required"][0], "expression");
        assert!(registry.get("shell").is_none());
    }
}
