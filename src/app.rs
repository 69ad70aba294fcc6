//! Application shell: CLI parsing, logging, and the staged startup that
//! constructs the Engine, the metadata resolver pool, and the API server,
//! then drives them to graceful shutdown.

use anyhow::Result;

use crate::api::ApiServer;
use crate::core::cli;
use crate::core::config::ServerConfig;
use crate::core::constants::{APP_NAME_LOWER, ENV_LOG};
use crate::core::shutdown::ShutdownService;
use crate::engine;
use crate::metadata;

pub struct CoreApp {
    pub shutdown: ShutdownService,
    pub config: ServerConfig,
}

impl CoreApp {
    pub async fn run() -> Result<()> {
        Self::init_logging();
        tracing::debug!("application starting");

        let cli = cli::parse();
        let config = ServerConfig::from_cli(cli);
        let app = Self::init(config);

        app.shutdown.install_signal_handlers();

        let (metadata_tx, metadata_rx) = metadata::work_channel();
        let engine = engine::spawn(&app.config, metadata_tx, &app.shutdown).await;
        metadata::spawn_workers(metadata_rx, engine.clone(), &app.shutdown).await;

        tracing::info!(host = %app.config.host, port = app.config.port, "malten starting");
        let server = ApiServer::new(engine, app.config.clone(), app.shutdown.clone());
        server.start().await?;

        app.shutdown.shutdown().await;
        Ok(())
    }

    fn init(config: ServerConfig) -> Self {
        Self {
            shutdown: ShutdownService::new(),
            config,
        }
    }

    fn init_logging() {
        let default_filter = format!("info,{}=info", APP_NAME_LOWER);
        let filter = std::env::var(ENV_LOG)
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or(default_filter);

        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true)
            .with_ansi(true)
            .compact()
            .with_env_filter(filter)
            .init();
    }
}
