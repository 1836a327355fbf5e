use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, info, warn};

use spotlight_core::error::SpotlightError;

use super::edge::{Edge, END};
use super::node::{GraphStep, Node, NodeOutput};
use super::state::AgentState;

/// Default bound on how often a single node may run in one execution.
pub const DEFAULT_MAX_VISITS: usize = 16;

/// Item of a graph run. Steps come first; the run then ends with exactly
/// one `Finished` or `Failed`.
#[derive(Debug)]
pub enum GraphEvent {
    Step(GraphStep),
    Finished(AgentState),
    Failed(SpotlightError),
}

/// Walks a graph of [`Node`]s.
///
/// Starting from `entry_node`, runs each node, evaluates its outgoing edges
/// in declaration order, and follows the first matching one. A node with no
/// outgoing edges, no matching edge, or an edge into [`END`] completes the
/// graph.
pub struct GraphExecutor {
    nodes: HashMap<String, Arc<dyn Node>>,
    edges: Vec<Edge>,
    entry_node: String,
    max_visits: usize,
}

impl GraphExecutor {
    /// Create a new graph executor.
    ///
    /// `entry_node` must be the id of a node in `nodes`.
    pub fn new(nodes: Vec<Arc<dyn Node>>, edges: Vec<Edge>, entry_node: impl Into<String>) -> Self {
        let node_map = nodes.into_iter().map(|n| (n.id().to_string(), n)).collect();
        Self {
            nodes: node_map,
            edges,
            entry_node: entry_node.into(),
            max_visits: DEFAULT_MAX_VISITS,
        }
    }

    pub fn with_max_visits(mut self, max_visits: usize) -> Self {
        self.max_visits = max_visits;
        self
    }

    fn next_node(&self, current: &str, state: &AgentState) -> Option<&str> {
        self.edges
            .iter()
            .filter(|e| e.from == current)
            .find(|e| e.condition.holds(state))
            .map(|e| e.to.as_str())
    }

    /// Run the graph from its entry node.
    ///
    /// Lazy: each node starts only when the previous one has finished and
    /// the consumer keeps pulling. Dropping the stream abandons the node
    /// that is currently running.
    pub fn execute(self: Arc<Self>, initial: AgentState) -> BoxStream<'static, GraphEvent> {
        Box::pin(async_stream::stream! {
            let mut state = initial;
            let mut current = self.entry_node.clone();
            let mut visits: HashMap<String, usize> = HashMap::new();

            loop {
                let visit = {
                    let count = visits.entry(current.clone()).or_insert(0);
                    *count += 1;
                    *count
                };
                if visit > self.max_visits {
                    warn!(node_id = %current, max_visits = self.max_visits, "Node visit limit reached");
                    yield GraphEvent::Failed(SpotlightError::Internal(format!(
                        "node '{}' visited more than {} times",
                        current, self.max_visits
                    )));
                    return;
                }

                let Some(node) = self.nodes.get(&current).cloned() else {
                    yield GraphEvent::Failed(SpotlightError::Internal(format!(
                        "node '{}' not found in graph",
                        current
                    )));
                    return;
                };

                info!(node_id = %current, visit, "Executing graph node");

                let mut outputs = node.run(state);
                let mut result = None;
                while let Some(output) = outputs.next().await {
                    match output {
                        NodeOutput::Step(step) => {
                            yield GraphEvent::Step(step);
                        }
                        NodeOutput::Done(next_state) => {
                            result = Some(next_state);
                            break;
                        }
                        NodeOutput::Failed(e) => {
                            warn!(node_id = %current, error = %e, "Graph node failed");
                            yield GraphEvent::Failed(e);
                            return;
                        }
                    }
                }
                drop(outputs);

                let Some(next_state) = result else {
                    yield GraphEvent::Failed(SpotlightError::Internal(format!(
                        "node '{}' ended without a result",
                        current
                    )));
                    return;
                };
                state = next_state;

                match self.next_node(&current, &state) {
                    Some(next) if next != END => {
                        debug!(from = %current, to = %next, "Following edge");
                        current = next.to_string();
                    }
                    _ => {
                        debug!(node_id = %current, "Graph complete");
                        yield GraphEvent::Finished(state);
                        return;
                    }
                }
            }
        })
    }
}
