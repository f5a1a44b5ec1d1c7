use authgate::{config::Config, start_server_with_config, telemetry};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

/// OAuth2 / OpenID Connect login gateway
#[derive(Debug, Parser)]
#[command(name = "authgate", version, about)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    telemetry::init_tracing(&config.logging)?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    // Listen for Ctrl-C in the background and ask the server to stop
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested, stopping server...");
            let _ = shutdown_tx.send(());
        }
    });

    let result = start_server_with_config(config, shutdown_rx).await;

    match &result {
        Ok(()) => info!("server stopped"),
        Err(e) => error!("server error: {:#}", e),
    }

    result
}
