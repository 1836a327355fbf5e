#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::stream::{BoxStream, StreamExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use spotlight_core::error::Result;
use spotlight_core::payload::ModelConfig;
use spotlight_core::traits::LlmClient;
use spotlight_core::types::{ChatMessage, StopReason, StreamDelta, ToolDefinition};
use spotlight_engine::Engine;
use spotlight_gateway::GatewayServer;

pub const MODEL_API_KEY: &str = "sk-model-key-never-echoed";

/// Plays back one scripted model turn per call.
pub struct ScriptedLlm {
    turns: Mutex<Vec<Vec<StreamDelta>>>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(turns: Vec<Vec<StreamDelta>>) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LlmClient for ScriptedLlm {
    fn chat_stream(
        &self,
        _config: &ModelConfig,
        _messages: Vec<ChatMessage>,
        _tools: &[ToolDefinition],
    ) -> BoxFuture<'_, Result<BoxStream<'_, Result<StreamDelta>>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let turn = {
            let mut turns = self.turns.lock().unwrap();
            if turns.is_empty() {
                Vec::new()
            } else {
                turns.remove(0)
            }
        };
        Box::pin(async move { Ok(futures::stream::iter(turn.into_iter().map(Ok)).boxed()) })
    }
}

pub fn answer(chunks: &[&str]) -> Vec<StreamDelta> {
    let mut turn: Vec<StreamDelta> = chunks
        .iter()
        .map(|c| StreamDelta::TextDelta(c.to_string()))
        .collect();
    turn.push(StreamDelta::Usage {
        input_tokens: 12,
        output_tokens: 4,
    });
    turn.push(StreamDelta::Stop(StopReason::EndTurn));
    turn
}

pub fn tool_call(name: &str, args: serde_json::Value) -> Vec<StreamDelta> {
    vec![
        StreamDelta::ToolUseStart {
            index: 0,
            id: "call_0".into(),
            name: name.into(),
        },
        StreamDelta::ToolInputDelta {
            index: 0,
            delta: args.to_string(),
        },
        StreamDelta::Stop(StopReason::ToolUse),
    ]
}

pub fn payload(workflow_id: &str, tools: serde_json::Value, vault: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "task_meta": {"workflow_id": workflow_id, "trace_id": "trace-abc", "user_id": "user-1"},
        "input": {"messages": [{"role": "user", "content": "1+1等于几？"}]},
        "runtime_config": {
            "model": {
                "model_name": "test-model",
                "base_url": "http://127.0.0.1:1/v1",
                "api_key": MODEL_API_KEY
            },
            "tools": tools,
            "vault": vault
        }
    })
}

/// Serve `engine` on an ephemeral port. Returns the base URL and the
/// shutdown token.
pub async fn start(engine: Engine) -> (String, CancellationToken) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let server = GatewayServer::new(engine);
    tokio::spawn(async move { server.serve(listener, token).await.unwrap() });
    (format!("http://{}", addr), shutdown)
}

/// One parsed SSE frame.
#[derive(Debug)]
pub struct Frame {
    pub id: Option<String>,
    pub event: String,
    pub data: serde_json::Value,
}

/// Parse a complete SSE body, skipping keepalive comments.
pub fn parse_frames(body: &str) -> Vec<Frame> {
    body.split("\n\n")
        .filter(|block| !block.is_empty() && !block.starts_with(':'))
        .map(|block| {
            let mut id = None;
            let mut event = String::new();
            let mut data = serde_json::Value::Null;
            for line in block.lines() {
                if let Some(v) = line.strip_prefix("id: ") {
                    id = Some(v.to_string());
                } else if let Some(v) = line.strip_prefix("event: ") {
                    event = v.to_string();
                } else if let Some(v) = line.strip_prefix("data: ") {
                    data = serde_json::from_str(v).unwrap();
                }
            }
            Frame { id, event, data }
        })
        .collect()
}

pub async fn run_workflow(base: &str, body: &serde_json::Value) -> (String, Vec<Frame>) {
    let response = reqwest::Client::new()
        .post(format!("{}/v1/run_workflow", base))
        .json(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    let text = response.text().await.unwrap();
    let frames = parse_frames(&text);
    (text, frames)
}
