//! Rewrite Agent Binary Entry Point

use clap::Parser;
use rewrite_agent::{init_logging, run_agent, AgentConfig, Args};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AgentConfig::load(&args)?;

    let _log_guard = init_logging(&config.logging)?;

    tokio::select! {
        result = run_agent(config) => {
            if let Err(e) = result {
                tracing::error!("Rewrite agent failed: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received, stopping rewrite agent...");
        }
    }

    Ok(())
}
