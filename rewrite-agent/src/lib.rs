//! Rewrite Agent
//!
//! Hosts the rewrite engine as a standalone service: restores the persisted
//! state, re-asserts the filter rules at startup, then serves the command
//! protocol over HTTP.

use clap::Parser;
use rewrite_core::{
    spawn_dispatcher, Dispatcher, DispatcherHandle, MemoryFilterEngine, SqliteKeyValueStore,
    SyncReport,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

pub mod config;
pub mod http;
pub mod logging;

pub use config::AgentConfig;
pub use logging::{init_logging, LoggingConfig};

#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Address to listen on for commands
    #[arg(long)]
    pub listen_addr: Option<String>,

    /// Port to listen on for commands
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// State database URL (e.g. sqlite:./rewrite.db)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Write logs to this file instead of stdout
    #[arg(long)]
    pub log_file: Option<String>,
}

/// A started agent: state restored, filter rules installed, mailbox running.
pub struct Agent {
    config: AgentConfig,
    handle: DispatcherHandle,
    engine: Arc<MemoryFilterEngine>,
    startup: SyncReport,
}

impl Agent {
    pub async fn start(config: AgentConfig) -> anyhow::Result<Self> {
        let backend = Arc::new(SqliteKeyValueStore::new(&config.database_url).await?);
        let engine = Arc::new(MemoryFilterEngine::new());

        let dispatcher = Dispatcher::from_config(backend, engine.clone(), &config.engine);
        let startup = dispatcher.resync().await?;

        let handle = spawn_dispatcher(Arc::new(dispatcher), config.engine.mailbox_capacity);

        Ok(Self {
            config,
            handle,
            engine,
            startup,
        })
    }

    pub fn handle(&self) -> &DispatcherHandle {
        &self.handle
    }

    pub fn engine(&self) -> &Arc<MemoryFilterEngine> {
        &self.engine
    }

    /// Result of the synchronization run during [`Agent::start`]
    pub fn startup_report(&self) -> SyncReport {
        self.startup
    }

    fn app_state(&self) -> http::AppState {
        http::AppState {
            handle: self.handle.clone(),
            engine: self.engine.clone(),
        }
    }

    /// Serve the HTTP command channel on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        http::serve(listener, self.app_state()).await
    }

    /// Bind the configured address and serve
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = format!("{}:{}", self.config.listen_address, self.config.listen_port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            anyhow::anyhow!("Failed to bind command channel on {}: {}", addr, e)
        })?;
        self.serve(listener).await
    }
}

pub async fn run_agent(config: AgentConfig) -> anyhow::Result<()> {
    tracing::info!("Starting Rewrite Agent...");
    tracing::info!("  Listen: {}:{}", config.listen_address, config.listen_port);
    tracing::info!("  State:  {}", config.database_url);

    let agent = Agent::start(config).await?;
    let report = agent.startup_report();
    tracing::info!(
        "Restored {} filter rules ({} stale removed)",
        report.installed,
        report.removed
    );

    agent.run().await
}
