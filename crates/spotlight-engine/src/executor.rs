use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::FutureExt;
use futures::stream::{self, BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use spotlight_core::error::SpotlightError;
use spotlight_core::event::CanonicalEvent;
use spotlight_core::payload::InputContext;

use crate::graph::{AgentState, GraphEvent, GraphStep};
use crate::workflows::{WorkflowContext, WorkflowRegistry};

/// Run a registered workflow and translate its graph into canonical events.
///
/// The sequence ends with exactly one `Done` or `Error`, unless `cancel`
/// fires first, in which case it ends silently and the running node is
/// dropped.
pub fn run(
    workflows: &WorkflowRegistry,
    workflow_id: &str,
    ctx: WorkflowContext,
    input: InputContext,
    cancel: CancellationToken,
) -> BoxStream<'static, CanonicalEvent> {
    let Some(builder) = workflows.get(workflow_id) else {
        let e = SpotlightError::UnknownWorkflow(workflow_id.to_string());
        warn!(workflow_id = %workflow_id, "Unknown workflow");
        return stream::once(async move { CanonicalEvent::error(e.wire_code(), e.wire_message()) })
            .boxed();
    };

    let state = AgentState::new(input.messages, input.variables, ctx.max_tool_rounds);
    let graph = Arc::new(builder(ctx));
    translate(graph.execute(state), cancel)
}

/// Map graph events to canonical events, enforcing the terminal contract.
pub fn translate(
    mut events: BoxStream<'static, GraphEvent>,
    cancel: CancellationToken,
) -> BoxStream<'static, CanonicalEvent> {
    Box::pin(async_stream::stream! {
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = AssertUnwindSafe(events.next()).catch_unwind() => Some(next),
            };
            let Some(next) = next else {
                debug!("Execution cancelled, abandoning workflow");
                return;
            };

            match next {
                Ok(Some(GraphEvent::Step(step))) => {
                    yield step_event(step);
                }
                Ok(Some(GraphEvent::Finished(state))) => {
                    let finish_reason = state.finish_reason();
                    info!(
                        prompt_tokens = state.usage.prompt_tokens,
                        completion_tokens = state.usage.completion_tokens,
                        tool_rounds = state.tool_rounds,
                        finish_reason = ?finish_reason,
                        "Workflow complete"
                    );
                    yield CanonicalEvent::Done {
                        usage: state.usage,
                        finish_reason,
                    };
                    return;
                }
                Ok(Some(GraphEvent::Failed(e))) => {
                    error!(error = %e, "Workflow failed");
                    yield CanonicalEvent::error(e.wire_code(), e.wire_message());
                    return;
                }
                Ok(None) => {
                    let e = SpotlightError::Internal("graph ended without a result".into());
                    error!(error = %e, "Workflow failed");
                    yield CanonicalEvent::error(e.wire_code(), e.wire_message());
                    return;
                }
                Err(panic) => {
                    error!(panic = %panic_message(panic.as_ref()), "Workflow panicked");
                    let e = SpotlightError::Internal("panic".into());
                    yield CanonicalEvent::error(e.wire_code(), e.wire_message());
                    return;
                }
            }
        }
    })
}

fn step_event(step: GraphStep) -> CanonicalEvent {
    match step {
        GraphStep::Reasoning(msg) => CanonicalEvent::thinking(msg),
        GraphStep::TextDelta(content) => CanonicalEvent::chunk(content),
        GraphStep::ToolRequested { name, args } => CanonicalEvent::ToolStart {
            tool_name: name,
            args,
        },
        GraphStep::ToolCompleted { name, outcome } => CanonicalEvent::tool_result(name, &outcome),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
