//! `agent_chat`: a model turn, then tool rounds until the model answers.
//!
//! ```text
//! llm ──(tool calls requested)──▶ tools ──▶ llm
//!  └──(otherwise)──▶ END
//! ```

use std::sync::Arc;

use futures::stream::{BoxStream, StreamExt};
use tracing::{debug, info, warn};

use spotlight_core::error::SpotlightError;
use spotlight_core::types::{ChatMessage, ToolContext, ToolErrorKind, ToolOutcome};
use spotlight_llm::{ModelClient, ModelEvent};
use spotlight_tools::ToolSet;

use super::WorkflowContext;
use crate::graph::{AgentState, Edge, GraphExecutor, GraphStep, Node, NodeOutput, END};

pub const WORKFLOW_ID: &str = "agent_chat";

const LLM_NODE: &str = "llm";
const TOOLS_NODE: &str = "tools";

pub fn build(ctx: WorkflowContext) -> GraphExecutor {
    let reasoning_events = ctx.model.config().supports_reasoning_events;
    let llm = LlmNode {
        model: ctx.model,
        tools: ctx.tools.clone(),
        reasoning_events,
    };
    let tools = ToolsNode {
        tools: ctx.tools,
        tool_context: ctx.tool_context,
    };

    GraphExecutor::new(
        vec![Arc::new(llm), Arc::new(tools)],
        vec![
            Edge::on_tool_calls(LLM_NODE, TOOLS_NODE),
            Edge::always(LLM_NODE, END),
            Edge::always(TOOLS_NODE, LLM_NODE),
        ],
        LLM_NODE,
    )
    // the llm node runs once more than the tools node
    .with_max_visits(ctx.max_tool_rounds + 1)
}

/// One model turn over the conversation so far.
struct LlmNode {
    model: ModelClient,
    tools: Arc<ToolSet>,
    reasoning_events: bool,
}

impl Node for LlmNode {
    fn id(&self) -> &str {
        LLM_NODE
    }

    fn run(&self, mut state: AgentState) -> BoxStream<'static, NodeOutput> {
        let mut events = self
            .model
            .stream(state.messages.clone(), self.tools.definitions());
        let reasoning_events = self.reasoning_events;

        Box::pin(async_stream::stream! {
            let mut text = String::new();
            let mut calls = Vec::new();
            let mut stop = None;

            while let Some(event) = events.next().await {
                match event {
                    Ok(ModelEvent::TextDelta(delta)) => {
                        if delta.is_empty() {
                            continue;
                        }
                        text.push_str(&delta);
                        yield NodeOutput::Step(GraphStep::TextDelta(delta));
                    }
                    Ok(ModelEvent::ReasoningDelta(delta)) => {
                        if reasoning_events && !delta.is_empty() {
                            yield NodeOutput::Step(GraphStep::Reasoning(delta));
                        }
                    }
                    Ok(ModelEvent::ToolCall(call)) => calls.push(call),
                    Ok(ModelEvent::Usage { prompt_tokens, completion_tokens }) => {
                        state.usage.add(prompt_tokens, completion_tokens);
                    }
                    Ok(ModelEvent::Finished(reason)) => stop = Some(reason),
                    Err(e) => {
                        yield NodeOutput::Failed(e);
                        return;
                    }
                }
            }

            let Some(stop) = stop else {
                yield NodeOutput::Failed(SpotlightError::Internal(
                    "model turn ended without a finish marker".into(),
                ));
                return;
            };

            debug!(
                chars = text.len(),
                tool_calls = calls.len(),
                stop_reason = ?stop,
                "Model turn complete"
            );

            state.messages.push(if calls.is_empty() {
                ChatMessage::assistant_text(text)
            } else {
                ChatMessage::assistant_tool_calls(text, calls.clone())
            });
            state.pending_tool_calls = calls;
            state.last_stop = Some(stop);
            yield NodeOutput::Done(state);
        })
    }
}

/// Runs every pending tool call in order, one round per visit.
struct ToolsNode {
    tools: Arc<ToolSet>,
    tool_context: ToolContext,
}

impl Node for ToolsNode {
    fn id(&self) -> &str {
        TOOLS_NODE
    }

    fn run(&self, mut state: AgentState) -> BoxStream<'static, NodeOutput> {
        let tools = self.tools.clone();
        let ctx = self.tool_context.clone();

        Box::pin(async_stream::stream! {
            let calls = std::mem::take(&mut state.pending_tool_calls);
            state.tool_rounds += 1;
            info!(round = state.tool_rounds, calls = calls.len(), "Running tool round");

            for call in calls {
                let name = call.name().to_string();
                let outcome = match call.parse_arguments() {
                    Ok(args) => {
                        yield NodeOutput::Step(GraphStep::ToolRequested {
                            name: name.clone(),
                            args: args.clone(),
                        });
                        tools.invoke(&name, args, ctx.clone()).await
                    }
                    Err(reason) => {
                        warn!(tool = %name, %reason, "Rejected tool arguments from model");
                        yield NodeOutput::Step(GraphStep::ToolRequested {
                            name: name.clone(),
                            args: serde_json::Value::String(call.function.arguments.clone()),
                        });
                        ToolOutcome::error(
                            ToolErrorKind::InvalidArguments,
                            format!("tool '{}': {}", name, reason),
                        )
                    }
                };

                info!(tool = %name, success = !outcome.is_error(), "Tool call finished");
                state.messages.push(ChatMessage::tool_result(
                    call.id.clone(),
                    name.clone(),
                    outcome.content_for_model(),
                ));
                yield NodeOutput::Step(GraphStep::ToolCompleted { name, outcome });
            }

            yield NodeOutput::Done(state);
        })
    }
}
