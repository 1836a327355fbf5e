use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use spotlight_core::config::EngineConfig;
use spotlight_core::error::{Result, SpotlightError};
use spotlight_core::event::CanonicalEvent;
use spotlight_core::payload::{ExecutionPayload, InputContext, TaskMeta};
use spotlight_core::traits::LlmClient;
use spotlight_core::types::ToolContext;
use spotlight_llm::ModelClient;
use spotlight_tools::{NativeToolRegistry, ToolDispatcher};

use crate::executor;
use crate::workflows::{WorkflowContext, WorkflowRegistry};

/// Progress messages emitted once configuration has resolved.
pub const PROGRESS_MESSAGES: [&str; 5] = [
    "Initializing workflow...",
    "Connecting to model service...",
    "Loading tools...",
    "Building workflow...",
    "Executing workflow...",
];

/// Process-wide execution entry point. Cheap to clone; read-only after
/// startup.
#[derive(Clone)]
pub struct Engine {
    config: Arc<EngineConfig>,
    workflows: Arc<WorkflowRegistry>,
    dispatcher: ToolDispatcher,
    llm_backend: Option<Arc<dyn LlmClient>>,
}

/// An execution whose configuration has fully resolved.
struct Prepared {
    meta: TaskMeta,
    ctx: WorkflowContext,
    input: InputContext,
}

impl Engine {
    /// Engine with the shipped workflows and native tools.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_registries(
            config,
            WorkflowRegistry::builtin(),
            NativeToolRegistry::with_builtins(),
        )
    }

    pub fn with_registries(
        config: EngineConfig,
        workflows: WorkflowRegistry,
        tools: NativeToolRegistry,
    ) -> Self {
        let dispatcher = ToolDispatcher::new(Arc::new(tools), config.tools.clone());
        Self {
            config: Arc::new(config),
            workflows: Arc::new(workflows),
            dispatcher,
            llm_backend: None,
        }
    }

    /// Route every model call through `llm` instead of the OpenAI-compatible
    /// client built from the request.
    pub fn with_llm_backend(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm_backend = Some(llm);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn workflows(&self) -> &WorkflowRegistry {
        &self.workflows
    }

    /// Native tools requests may reference by name.
    pub fn native_tools(&self) -> &NativeToolRegistry {
        self.dispatcher.registry()
    }

    /// Start one execution.
    ///
    /// Configuration problems produce a single `Error{400}` and nothing
    /// else. Otherwise the progress messages are followed by the workflow's
    /// own events and exactly one terminal event, unless `cancel` fires.
    pub fn execute(
        &self,
        payload: ExecutionPayload,
        cancel: CancellationToken,
    ) -> BoxStream<'static, CanonicalEvent> {
        let prepared = match self.prepare(payload) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(error = %e, "Execution rejected");
                return stream::once(async move {
                    CanonicalEvent::error(e.wire_code(), e.wire_message())
                })
                .boxed();
            }
        };

        info!(
            model = %prepared.ctx.model.config().model_name,
            tools = prepared.ctx.tools.len(),
            messages = prepared.input.messages.len(),
            "Execution prepared"
        );

        let progress = stream::iter(PROGRESS_MESSAGES.map(CanonicalEvent::thinking));
        let run = executor::run(
            &self.workflows,
            &prepared.meta.workflow_id,
            prepared.ctx,
            prepared.input,
            cancel,
        );
        progress.chain(run).boxed()
    }

    fn prepare(&self, payload: ExecutionPayload) -> Result<Prepared> {
        let ExecutionPayload {
            task_meta,
            input,
            runtime_config,
        } = payload;

        if !self.workflows.contains(&task_meta.workflow_id) {
            return Err(SpotlightError::UnknownWorkflow(task_meta.workflow_id));
        }
        if input.messages.is_empty() {
            return Err(SpotlightError::Config("input.messages must not be empty".into()));
        }

        let tools = self
            .dispatcher
            .resolve(&runtime_config.tools, Arc::new(runtime_config.vault))?;

        let model = match &self.llm_backend {
            Some(llm) => ModelClient::with_backend(
                runtime_config.model,
                llm.clone(),
                Duration::from_secs(self.config.model.request_timeout_secs),
            )?,
            None => ModelClient::new(runtime_config.model, &self.config)?,
        };

        let ctx = WorkflowContext {
            model,
            tools: Arc::new(tools),
            tool_context: ToolContext {
                trace_id: task_meta.trace_id.clone(),
                user_id: task_meta.user_id.clone(),
            },
            max_tool_rounds: self.config.workflow.max_tool_rounds,
        };

        Ok(Prepared {
            meta: task_meta,
            ctx,
            input,
        })
    }
}
