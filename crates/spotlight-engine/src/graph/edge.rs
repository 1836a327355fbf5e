use super::state::AgentState;

/// Target id that ends the graph.
pub const END: &str = "__end__";

/// An edge connecting two nodes in the execution graph.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Source node id.
    pub from: String,
    /// Target node id, or [`END`].
    pub to: String,
    /// Condition that must be true to traverse this edge.
    pub condition: EdgeCondition,
}

/// Condition for traversing an edge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EdgeCondition {
    /// Always traverse this edge.
    #[default]
    Always,
    /// The last model turn requested tools and the tool budget is not spent.
    ToolCallsRequested,
}

impl EdgeCondition {
    pub fn holds(&self, state: &AgentState) -> bool {
        match self {
            Self::Always => true,
            Self::ToolCallsRequested => {
                state.has_pending_tool_calls() && state.tool_budget_left()
            }
        }
    }
}

impl Edge {
    /// Create an unconditional edge.
    pub fn always(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            condition: EdgeCondition::Always,
        }
    }

    /// Create an edge taken when the model asked for tools.
    pub fn on_tool_calls(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            condition: EdgeCondition::ToolCallsRequested,
        }
    }
}
