mod console;
mod recipes;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use craftmind_ai::GeminiClient;
use craftmind_core::{AgentConfig, SessionLifecycleManager};
use craftmind_traits::TextGenerator;

#[derive(Parser)]
#[command(name = "craftmind-agent")]
#[command(version, about = "CraftMind - a conversational agent for block worlds")]
struct Cli {
    /// Config file (defaults to $CRAFTMIND_CONFIG, then ./craftmind.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "debug"
    } else {
        "info,craftmind_core=debug"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with_target(false)
        .init();

    let config = AgentConfig::load(cli.config.as_deref())?;
    info!(
        host = config.server.host,
        port = config.server.port,
        username = config.identity.username,
        "starting CraftMind agent"
    );

    let generator: Option<Arc<dyn TextGenerator>> = match &config.ai.api_key {
        Some(api_key) => {
            let mut client = GeminiClient::new(api_key.clone());
            if let Some(model) = &config.ai.model {
                client = client.with_model(model.clone());
            }
            Some(Arc::new(client))
        }
        None => {
            warn!("no API key configured; AI chat disabled, deterministic replies only");
            None
        }
    };

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            signal_token.cancel();
        }
    });

    let manager = SessionLifecycleManager::new(
        Arc::new(console::ConsoleConnector),
        generator,
        Arc::new(recipes::StaticRecipeBook),
        config,
        shutdown,
    );
    manager.run().await
}
