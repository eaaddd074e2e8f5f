use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use advisory_proxy::{AdvisoryConfig, AdvisoryService, AppState, PerplexityClient, telemetry, web};

#[derive(Parser)]
#[command(name = "advisory-proxy")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured listen port
    #[arg(short, long)]
    port: Option<u16>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AdvisoryConfig::load_from_path(cli.config)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    let _telemetry = telemetry::init(&config.logging, &config.telemetry)?;
    info!("Starting advisory-proxy {}", advisory_proxy::VERSION);

    let service = match config.upstream.api_key() {
        Some(api_key) => {
            let client = PerplexityClient::new(&config.upstream, api_key)?;
            info!(
                "Using {} at {}",
                config.upstream.model, config.upstream.base_url
            );
            AdvisoryService::new(Arc::new(client))
        }
        None => {
            error!(
                "Perplexity API key not configured (set PERPLEXITY_API_KEY or upstream.api_key); advisory requests will fail"
            );
            AdvisoryService::unconfigured()
        }
    };

    web::run(&config.server, AppState::new(service)).await
}
