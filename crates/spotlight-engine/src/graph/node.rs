use futures::stream::BoxStream;

use spotlight_core::error::SpotlightError;
use spotlight_core::types::ToolOutcome;

use super::state::AgentState;

/// Observable step produced inside a node.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphStep {
    /// Reasoning text from the model.
    Reasoning(String),
    /// Answer text from the model.
    TextDelta(String),
    /// A tool is about to run.
    ToolRequested {
        name: String,
        args: serde_json::Value,
    },
    /// A tool finished, successfully or not.
    ToolCompleted { name: String, outcome: ToolOutcome },
}

/// Item of a node's output stream. A node yields any number of `Step`s
/// and then exactly one `Done` or `Failed`.
#[derive(Debug)]
pub enum NodeOutput {
    Step(GraphStep),
    Done(AgentState),
    Failed(SpotlightError),
}

/// A node in the execution graph.
pub trait Node: Send + Sync + 'static {
    /// Unique identifier for this node.
    fn id(&self) -> &str;

    /// Run the node on `state`. The stream owns everything it needs, so
    /// dropping it abandons any in-flight work.
    fn run(&self, state: AgentState) -> BoxStream<'static, NodeOutput>;
}
