use std::time::Duration;

use tokio_util::sync::CancellationToken;

use spotlight_engine::Engine;

/// Shared application state for axum handlers.
pub struct AppState {
    pub engine: Engine,
    pub keepalive: Duration,
    /// Parent of every per-request cancellation token.
    pub shutdown: CancellationToken,
}
