//! `DocchatServer`: Axum HTTP + WebSocket gateway.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use docchat_llm::AnswerService;
use docchat_store::DocumentStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::GatewayConfig;
use crate::pipeline::QueryPipeline;
use crate::routes::{self, chat, documents};
use crate::shutdown::{GatewayTask, ShutdownCoordinator};
use crate::websocket::handler::ws_handler;
use crate::websocket::hub::Hub;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session registry.
    pub hub: Hub,
    /// Query pipeline shared by every session and `/ask`.
    pub pipeline: Arc<QueryPipeline>,
    /// Document store for REST handlers.
    pub store: Arc<DocumentStore>,
    /// Renders `/metrics`.
    pub metrics: PrometheusHandle,
    /// When the server started.
    pub start_time: Instant,
    /// Gateway configuration.
    pub config: Arc<GatewayConfig>,
}

/// The docchat gateway.
pub struct DocchatServer {
    state: AppState,
    shutdown: Arc<ShutdownCoordinator>,
}

impl DocchatServer {
    /// Create a server and start its session registry.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(
        config: GatewayConfig,
        store: Arc<DocumentStore>,
        answers: Arc<dyn AnswerService>,
        metrics: PrometheusHandle,
    ) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let (hub, hub_task) = Hub::spawn(shutdown.token());
        shutdown.track(GatewayTask::Registry, hub_task);
        let pipeline = Arc::new(QueryPipeline::new(
            store.clone(),
            answers,
            hub.clone(),
            config.pipeline,
        ));
        Self {
            state: AppState {
                hub,
                pipeline,
                store,
                metrics,
                start_time: Instant::now(),
                config: Arc::new(config),
            },
            shutdown,
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let config = &self.state.config;
        Router::new()
            .route("/health", get(routes::health_handler))
            .route("/metrics", get(routes::metrics_handler))
            .route("/ws", get(ws_handler))
            .route("/upload", post(documents::upload))
            .route("/users/{user_id}/documents", get(documents::list_user_documents))
            .route("/documents/{document_id}", get(documents::get_document))
            .route("/documents/{document_id}/chunks", get(documents::list_chunks))
            .route("/documents/{document_id}/chat", get(chat::history))
            .route("/chat", post(chat::save_message))
            .route("/ask", post(chat::ask))
            .fallback(routes::not_found)
            .layer(DefaultBodyLimit::max(config.max_upload_bytes))
            .layer(cors_layer(&config.allowed_origins))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// The accept loop is tracked by the shutdown coordinator; drain it with
    /// [`ShutdownCoordinator::drain`].
    pub async fn listen(&self) -> std::io::Result<SocketAddr> {
        let config = &self.state.config;
        let listener = TcpListener::bind((config.host.as_str(), config.port)).await?;
        let addr = listener.local_addr()?;
        let app = self.router();
        let token = self.shutdown.token();

        info!(%addr, "docchat gateway listening");
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server error");
            }
            info!("listener stopped");
        });
        self.shutdown.track(GatewayTask::Listener, handle);
        Ok(addr)
    }

    /// Get the session registry.
    pub fn hub(&self) -> &Hub {
        &self.state.hub
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the gateway configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.state.config
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::ORIGIN,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::AUTHORIZATION,
        ])
        .allow_credentials(true)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
