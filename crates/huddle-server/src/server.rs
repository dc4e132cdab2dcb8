//! `HuddleServer`: router assembly and listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::get;
use huddle_settings::HuddleSettings;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::errors::ServerError;
use crate::routes;
use crate::shutdown::ShutdownSignal;
use crate::websocket::broker::Broker;
use crate::websocket::handler::{SocketLimits, chat_upgrade};
use crate::websocket::session::ChatContext;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Verifier, store, and broker shared by every session.
    pub chat: Arc<ChatContext>,
    /// Shutdown signal and socket tracker.
    pub shutdown: Arc<ShutdownSignal>,
    /// Per-socket limits.
    pub limits: SocketLimits,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle, if a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The huddle chat server.
pub struct HuddleServer {
    bind_addr: String,
    state: AppState,
}

impl HuddleServer {
    /// Create a server from settings and its collaborators.
    pub fn new(settings: &HuddleSettings, chat: ChatContext, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            bind_addr: settings.bind_addr(),
            state: AppState {
                chat: Arc::new(chat),
                shutdown: Arc::new(ShutdownSignal::new()),
                limits: SocketLimits {
                    max_frame_bytes: settings.server.max_frame_bytes,
                    outbound_buffer: settings.broker.outbound_buffer,
                },
                start_time: Instant::now(),
                metrics,
            },
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws/chat/{group_id}", get(chat_upgrade))
            .route("/ws/chat/{group_id}/", get(chat_upgrade))
            .route("/api/groups/{group_id}/messages", get(routes::group_history))
            .route("/health", get(routes::health_handler))
            .route("/metrics", get(routes::metrics_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port 0) and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let listener = TcpListener::bind(&self.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.bind_addr.clone(),
                source,
            })?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.state.shutdown.token();
        let handle = tokio::spawn(async move {
            let served = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await;
            if let Err(e) = served {
                error!(error = %e, "server stopped with error");
            }
        });
        info!(%addr, "huddle server listening");
        Ok((addr, handle))
    }

    /// The group fan-out registry.
    pub fn broker(&self) -> &Arc<Broker> {
        &self.state.chat.broker
    }

    /// Shutdown signal shared with every chat socket.
    pub fn shutdown(&self) -> &Arc<ShutdownSignal> {
        &self.state.shutdown
    }
}
