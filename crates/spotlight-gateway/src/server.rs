use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use spotlight_engine::Engine;

use crate::routes;
use crate::state::AppState;

/// HTTP + SSE gateway built on axum.
pub struct GatewayServer {
    engine: Engine,
}

impl GatewayServer {
    pub fn new(engine: Engine) -> Self {
        Self { engine }
    }

    /// Build the router. In-flight executions are cancelled when `shutdown`
    /// fires.
    pub fn router(&self, shutdown: CancellationToken) -> Router {
        let state = Arc::new(AppState {
            engine: self.engine.clone(),
            keepalive: Duration::from_secs(self.engine.config().stream.keepalive_secs),
            shutdown,
        });

        Router::new()
            .route("/", get(routes::index))
            .route("/health", get(routes::health))
            .route("/v1/run_workflow", post(routes::run_workflow))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive()),
            )
            .with_state(state)
    }

    /// Bind the configured address and serve until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let bind = &self.engine.config().server.bind;
        let listener = TcpListener::bind(bind).await?;
        info!(bind = %bind, "Gateway listening");
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` fires.
    pub async fn serve(&self, listener: TcpListener, shutdown: CancellationToken) -> anyhow::Result<()> {
        let app = self.router(shutdown.clone());

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}
