use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use a3s_activity::cli::{Cli, Commands};
use a3s_activity::{ActivityConfig, Logger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => ActivityConfig::load_from(path)?,
        None => ActivityConfig::load()?,
    };

    // Opening storage fails fast when the backend is unavailable
    let logger = Arc::new(Logger::from_config(&config)?);

    match cli.command {
        Commands::List(args) => {
            a3s_activity::cli::list::execute(&logger, &args)?;
        }
        Commands::Cleanup { months } => {
            a3s_activity::cli::cleanup::execute(logger.clone(), months)?;
        }
        Commands::Stats { format } => {
            a3s_activity::cli::stats::execute(&logger, format)?;
        }
        Commands::Types { format } => {
            a3s_activity::cli::types::execute(logger.registry(), format)?;
        }
        Commands::Serve { host, port } => {
            a3s_activity::cli::serve::execute(logger.clone(), config, host, port).await?;
        }
    }

    logger.shutdown();
    Ok(())
}
