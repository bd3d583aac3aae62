//! EnChat gateway CLI entrypoint.

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod client;
mod commands;
mod config;
mod handlers;

use commands::{CacheCommands, Commands, ConfigCommands};
use config::CliConfig;

#[derive(Parser)]
#[command(name = "enchat")]
#[command(author, version, about = "EnChat offline gateway", long_about = None)]
struct Cli {
    /// Gateway URL for client commands
    #[arg(long, global = true, env = "ENCHAT_GATEWAY_URL")]
    gateway_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = CliConfig::load().unwrap_or_default();
    if let Some(url) = cli.gateway_url {
        config.gateway_url = url;
    }

    match cli.command {
        Commands::Serve(args) => handlers::serve(args).await?,
        Commands::Version => handlers::version(&config).await?,
        Commands::SkipWaiting => handlers::skip_waiting(&config).await?,
        Commands::Install { tag } => handlers::install(&config, &tag).await?,
        Commands::Sync { tag } => handlers::sync(&config, &tag).await?,
        Commands::Cache { command } => match command {
            CacheCommands::List => handlers::list_cache(&config).await?,
            CacheCommands::Clear { name } => handlers::clear_cache(&config, &name).await?,
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => handlers::show_config(&config)?,
            ConfigCommands::Set { key, value } => handlers::set_config(&key, &value)?,
        },
    }

    Ok(())
}
