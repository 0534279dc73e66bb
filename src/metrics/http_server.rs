//! HTTP server for metrics, health, and status endpoints.
//!
//! Provides:
//! - `/metrics` - Prometheus metrics
//! - `/health` - Health check
//! - `/status` - Live counter snapshot of the run

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::{MetricsSnapshot, RunMetrics};

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Shutdown timeout.
    pub shutdown_timeout: Duration,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 9090)),
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct HttpServerState {
    /// Run metrics.
    pub metrics: Arc<RunMetrics>,
    /// Server start time.
    pub start_time: Instant,
}

/// Status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub uptime_seconds: u64,
    pub counters: MetricsSnapshot,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// HTTP metrics server.
pub struct MetricsHttpServer {
    config: HttpServerConfig,
    state: HttpServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl MetricsHttpServer {
    /// Create a new HTTP server.
    pub fn new(config: HttpServerConfig, metrics: Arc<RunMetrics>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config,
            state: HttpServerState {
                metrics,
                start_time: Instant::now(),
            },
            shutdown_tx,
        }
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, std::io::Error> {
        TcpListener::bind(self.config.bind_addr).await
    }

    /// Start the HTTP server on the configured address.
    pub async fn start(&self) -> Result<(), std::io::Error> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until [`stop`](Self::stop) is called.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), std::io::Error> {
        let app = self.build_router();
        info!("Starting metrics HTTP server on {}", listener.local_addr()?);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
    }

    /// Build the router.
    fn build_router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .route("/status", get(status_handler))
            .route("/", get(root_handler))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Stop the server.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Configured shutdown timeout.
    pub fn shutdown_timeout(&self) -> Duration {
        self.config.shutdown_timeout
    }
}

/// Root handler - returns service info.
async fn root_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "vaultload",
        "version": crate::VERSION,
        "endpoints": ["/metrics", "/health", "/status"]
    }))
}

/// Metrics handler - returns Prometheus metrics.
async fn metrics_handler(State(state): State<HttpServerState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(metrics) => (
            StatusCode::OK,
            [("content-type", "text/plain; charset=utf-8")],
            metrics,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}"),
        ),
    }
}

/// Health handler.
async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
        }),
    )
}

/// Status handler - returns the live counters.
async fn status_handler(State(state): State<HttpServerState>) -> impl IntoResponse {
    Json(StatusResponse {
        version: crate::VERSION.to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        counters: state.metrics.snapshot(),
    })
}
