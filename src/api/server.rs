//! API server assembly: router, shared state, graceful shutdown wiring.

use std::net::SocketAddr;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use crate::core::config::ServerConfig;
use crate::core::constants::DEFAULT_BODY_LIMIT;
use crate::core::shutdown::ShutdownService;
use crate::engine::EngineHandle;

use super::embedded::{describe, serve_assets};
use super::middleware::{cors, handle_404};
use super::routes::{commands, events, messages, streams};
use super::session::ensure_session;

/// State shared by every route handler: the Engine handle and the tunables
/// routes need for validation (message byte caps, default limits).
#[derive(Clone)]
pub struct AppState {
    pub engine: EngineHandle,
    pub config: ServerConfig,
}

pub struct ApiServer {
    state: AppState,
    shutdown: ShutdownService,
}

impl ApiServer {
    pub fn new(engine: EngineHandle, config: ServerConfig, shutdown: ShutdownService) -> Self {
        Self {
            state: AppState { engine, config },
            shutdown,
        }
    }

    pub async fn start(self) -> Result<()> {
        let addr: SocketAddr = self.state.config.socket_addr()?;

        let router = Router::new()
            .route("/", get(serve_assets))
            .route("/api", get(describe))
            .route("/streams", get(streams::list).post(streams::create))
            .route("/messages", get(messages::get).post(messages::post))
            .route("/commands", axum::routing::post(commands::post))
            .route("/events", get(events::handle))
            .fallback(handle_404)
            .layer(axum::middleware::from_fn(ensure_session))
            .layer(CompressionLayer::new())
            .layer(cors())
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT))
            .with_state(self.state);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(%addr, "listening");
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(self.shutdown.wait())
            .await?;

        Ok(())
    }
}
