//! p2px escrow engine - Entry Point

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// p2px escrow engine daemon
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via P2PX_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Load and validate the configuration, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // CLI arg > P2PX_CONFIG > default
    let config_path = args
        .config
        .or_else(|| std::env::var("P2PX_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    let config = p2px_daemon::AppConfig::load(&config_path)?;
    p2px_telemetry::init_logging(config.telemetry.log_level.as_deref())?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config_path = %config_path,
        "Starting p2px daemon"
    );

    if args.check {
        info!("Configuration OK");
        return Ok(());
    }

    let app = p2px_daemon::Application::new(config)?;
    app.run().await?;

    Ok(())
}
