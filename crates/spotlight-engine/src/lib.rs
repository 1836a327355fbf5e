pub mod execution;
pub mod executor;
pub mod graph;
pub mod workflows;

pub use execution::{Engine, PROGRESS_MESSAGES};
pub use graph::{AgentState, GraphExecutor};
pub use workflows::{WorkflowContext, WorkflowRegistry};
