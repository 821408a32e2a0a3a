//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router (proxy path, preflight, health)
//! - Wire up middleware (request ID, tracing)
//! - Hold the swappable config/client snapshot used by handlers
//! - Apply config reloads and stop on shutdown

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::http::proxy::{head_handler, preflight_handler, proxy_handler};
use crate::http::request::{request_id, UuidRequestId};
use crate::http::response::{InvalidTemplate, ResponseTemplate};
use crate::lifecycle::shutdown::wait_for;
use crate::security::TargetPolicy;
use crate::upstream::{ClientBuildError, StreamTracker, UpstreamClient};

/// Path of the liveness endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Error building the server state from configuration.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Client(#[from] ClientBuildError),

    #[error(transparent)]
    Response(#[from] InvalidTemplate),
}

/// Everything a proxy request needs, derived from one configuration.
#[derive(Debug)]
pub struct ProxyState {
    pub config: ProxyConfig,
    pub upstream: UpstreamClient,
    pub policy: TargetPolicy,
    pub response: ResponseTemplate,
}

impl ProxyState {
    pub fn from_config(config: ProxyConfig) -> Result<Self, ServerError> {
        Ok(Self {
            upstream: UpstreamClient::new(&config.upstream)?,
            policy: TargetPolicy::from_config(&config.security),
            response: ResponseTemplate::from_config(&config.response)?,
            config,
        })
    }
}

/// Application state injected into handlers.
///
/// The stream tracker outlives config reloads; the snapshot does not.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<ArcSwap<ProxyState>>,
    streams: StreamTracker,
}

impl AppState {
    pub fn new(state: ProxyState) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(state)),
            streams: StreamTracker::new(),
        }
    }

    /// Tracker for upstream bodies currently being relayed.
    pub fn streams(&self) -> &StreamTracker {
        &self.streams
    }

    /// Current snapshot. In-flight requests keep the one they loaded.
    pub fn load(&self) -> Arc<ProxyState> {
        self.inner.load_full()
    }

    /// Rebuild the snapshot from a new configuration.
    ///
    /// Listener settings are fixed at startup and are not applied.
    pub fn reload(&self, config: ProxyConfig) -> Result<(), ServerError> {
        let current = self.load();
        if current.config.listener != config.listener {
            tracing::warn!("Listener settings changed; restart required to apply them");
        }
        let next = ProxyState::from_config(config)?;
        self.inner.store(Arc::new(next));
        tracing::info!("Configuration reloaded");
        Ok(())
    }
}

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub active_streams: u64,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_streams: state.streams().active_count(),
    })
}

/// Apply configuration updates until the sender is gone or shutdown fires.
pub async fn apply_updates(
    state: AppState,
    mut updates: mpsc::UnboundedReceiver<ProxyConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            update = updates.recv() => match update {
                Some(config) => {
                    if let Err(e) = state.reload(config) {
                        tracing::error!(error = %e, "Rejected reloaded configuration");
                    }
                }
                None => break,
            },
        }
    }
    tracing::debug!("Config update task stopped");
}

/// HTTP server for the stream proxy.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let path = config.listener.path.clone();
        let state = AppState::new(ProxyState::from_config(config)?);
        let router = Self::build_router(&path, state.clone());
        Ok(Self { router, state })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(path: &str, state: AppState) -> Router {
        Router::new()
            .route(
                path,
                get(proxy_handler)
                    .head(head_handler)
                    .options(preflight_handler),
            )
            .route(HEALTH_PATH, get(health_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                        tracing::info_span!(
                            "request",
                            method = %request.method(),
                            path = %request.uri().path(),
                            request_id = %request_id(request.headers()),
                        )
                    }))
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// A clone of the router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Shared handler state.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server until `shutdown` fires, applying config updates as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        tokio::spawn(apply_updates(
            self.state.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));

        axum::serve(listener, self.router)
            .with_graceful_shutdown(wait_for(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
