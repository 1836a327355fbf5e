use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, info_span, warn, Instrument};

use spotlight_core::payload::ExecutionPayload;

use crate::controller::EventStreamController;
use crate::state::AppState;

/// Frames buffered between the controller and the response body.
const FRAME_BUFFER: usize = 32;

// GET /: service info
pub async fn index(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "spotlight",
        "version": env!("CARGO_PKG_VERSION"),
        "workflows": state.engine.workflows().ids(),
        "native_tools": state.engine.native_tools().list(),
    }))
}

// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

// POST /v1/run_workflow: streams the execution as server-sent events
pub async fn run_workflow(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ExecutionPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            // the body may carry credentials, so its text is not echoed
            let status = rejection.status();
            warn!(status = status.as_u16(), "Rejected execution payload");
            return (
                status,
                Json(serde_json::json!({ "error": "invalid execution payload" })),
            )
                .into_response();
        }
    };

    let meta = payload.task_meta.clone();
    let span = info_span!(
        "execution",
        trace_id = %meta.trace_id,
        workflow_id = %meta.workflow_id,
        user_id = %meta.user_id,
    );

    let cancel = state.shutdown.child_token();
    let events = {
        let _enter = span.enter();
        info!(tools = payload.runtime_config.tools.len(), "Execution requested");
        state.engine.execute(payload, cancel.clone())
    };

    let (tx, rx) = mpsc::channel(FRAME_BUFFER);
    let controller = EventStreamController::new(meta.trace_id, state.keepalive, cancel);
    tokio::spawn(controller.run(events, tx).instrument(span));

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
    let mut response = Response::new(body);
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert("x-accel-buffering", HeaderValue::from_static("no"));
    response
}
