use std::collections::HashMap;

use spotlight_core::event::{FinishReason, Usage};
use spotlight_core::types::{ChatMessage, StopReason, ToolCall};

/// State threaded through the graph. Each node takes it by value and hands
/// back the updated copy.
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    /// Conversation so far, including model and tool turns added by nodes.
    pub messages: Vec<ChatMessage>,
    /// Caller-supplied variables.
    pub variables: HashMap<String, serde_json::Value>,
    /// Tool calls requested by the last model turn and not yet executed.
    pub pending_tool_calls: Vec<ToolCall>,
    /// Completed tool rounds.
    pub tool_rounds: usize,
    /// Upper bound on tool rounds.
    pub max_tool_rounds: usize,
    /// Stop reason of the last model turn.
    pub last_stop: Option<StopReason>,
    /// Token usage summed over every model turn.
    pub usage: Usage,
}

impl AgentState {
    pub fn new(
        messages: Vec<ChatMessage>,
        variables: HashMap<String, serde_json::Value>,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            messages,
            variables,
            max_tool_rounds,
            ..Self::default()
        }
    }

    pub fn has_pending_tool_calls(&self) -> bool {
        !self.pending_tool_calls.is_empty()
    }

    pub fn tool_budget_left(&self) -> bool {
        self.tool_rounds < self.max_tool_rounds
    }

    /// Finish reason reported when the graph reaches its end.
    pub fn finish_reason(&self) -> FinishReason {
        if self.has_pending_tool_calls() {
            return FinishReason::ToolCalls;
        }
        match self.last_stop {
            Some(StopReason::MaxTokens) => FinishReason::Length,
            _ => FinishReason::Stop,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason() {
        let mut state = AgentState::new(vec![], HashMap::new(), 5);
        assert_eq!(state.finish_reason(), FinishReason::Stop);

        state.last_stop = Some(StopReason::MaxTokens);
        assert_eq!(state.finish_reason(), FinishReason::Length);

        state.pending_tool_calls.push(ToolCall::new("c", "t", "{}"));
        assert_eq!(state.finish_reason(), FinishReason::ToolCalls);
    }

    #[test]
    fn test_tool_budget() {
        let mut state = AgentState::new(vec![], HashMap::new(), 2);
        assert!(state.tool_budget_left());
        state.tool_rounds = 2;
        assert!(!state.tool_budget_left());
    }
}
