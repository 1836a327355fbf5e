//! Graph runtime: workflows as nodes connected by conditional edges.
//!
//! Each node consumes the shared [`AgentState`] and produces a lazy stream
//! of [`GraphStep`]s followed by the updated state. The [`GraphExecutor`]
//! walks the graph from its entry node, following the first edge whose
//! condition holds, until an edge leads to [`END`].

pub mod edge;
pub mod executor;
pub mod node;
pub mod state;

pub use edge::{Edge, EdgeCondition, END};
pub use executor::{GraphEvent, GraphExecutor};
pub use node::{GraphStep, Node, NodeOutput};
pub use state::AgentState;
