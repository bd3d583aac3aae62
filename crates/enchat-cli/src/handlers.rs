//! Command handlers.

use crate::client::ApiClient;
use crate::commands::ServeArgs;
use crate::config::{CliConfig, OutputFormat};
use console::style;
use enchat_core::GatewayConfig;
use enchat_gateway::{AppState, Gateway, create_router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Build the gateway configuration from a file and flag overrides.
pub fn gateway_config(args: &ServeArgs) -> anyhow::Result<GatewayConfig> {
    let mut config = match &args.config {
        Some(path) => GatewayConfig::load(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(listen) = &args.listen {
        config.listen_addr = listen.clone();
    }
    if let Some(upstream) = &args.upstream {
        config.upstream = upstream.clone();
    }
    if let Some(tag) = &args.version_tag {
        config.version = tag.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Run the gateway until Ctrl-C.
pub async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = gateway_config(&args)?;
    let listen_addr = config.listen_addr.clone();
    let gateway = Arc::new(Gateway::from_config(config)?);

    // Requests pass through uncontrolled until an install succeeds.
    match gateway.start().await {
        Ok(outcome) => info!(?outcome, "Gateway installed"),
        Err(e) => error!(error = %e, "Initial install failed"),
    }

    let app = create_router(Arc::new(AppState::new(gateway.clone())));
    let listener = TcpListener::bind(&listen_addr).await?;
    println!(
        "{} Gateway {} listening on {}",
        style("▶").cyan(),
        style(&gateway.config().version).bold(),
        listen_addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    gateway.flush_writes().await;
    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

/// Show the active version.
pub async fn version(config: &CliConfig) -> anyhow::Result<()> {
    let version = ApiClient::new(config).version().await?;
    match config.output_format {
        OutputFormat::Table => println!("{}", version),
        OutputFormat::Json => println!("{}", serde_json::json!({ "version": version })),
        OutputFormat::Yaml => println!("version: {}", version),
    }
    Ok(())
}

pub async fn skip_waiting(config: &CliConfig) -> anyhow::Result<()> {
    ApiClient::new(config).skip_waiting().await?;
    println!("{} Skip waiting requested", style("✓").green());
    Ok(())
}

pub async fn install(config: &CliConfig, tag: &str) -> anyhow::Result<()> {
    println!("Installing {}...", style(tag).bold());
    let outcome = ApiClient::new(config).install(tag).await?;
    let state = outcome["state"].as_str().unwrap_or("unknown");
    println!(
        "{} Installed {} ({}, {} precached)",
        style("✓").green(),
        tag,
        state,
        outcome["precached"]
    );
    Ok(())
}

pub async fn sync(config: &CliConfig, tag: &str) -> anyhow::Result<()> {
    match ApiClient::new(config).sync(tag).await? {
        Some(report) => println!(
            "{} Replayed {}, failed {}, remaining {}",
            style("✓").green(),
            report.replayed,
            report.failed,
            report.remaining
        ),
        None => println!("{} Tag {} is not handled", style("i").blue(), tag),
    }
    Ok(())
}

pub async fn list_cache(config: &CliConfig) -> anyhow::Result<()> {
    let list = ApiClient::new(config).list_partitions().await?;
    match config.output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&list.partitions)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&list.partitions)?),
        OutputFormat::Table => {
            if list.partitions.is_empty() {
                println!("{} No partitions", style("i").blue());
            }
            for name in &list.partitions {
                println!("  {}", name);
            }
            println!("{} partition(s)", list.total);
        }
    }
    Ok(())
}

pub async fn clear_cache(config: &CliConfig, name: &str) -> anyhow::Result<()> {
    ApiClient::new(config).delete_partition(name).await?;
    println!("{} Deleted {}", style("✓").green(), name);
    Ok(())
}

pub fn show_config(config: &CliConfig) -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}

pub fn set_config(key: &str, value: &str) -> anyhow::Result<()> {
    let mut config = CliConfig::load().unwrap_or_default();
    config.set(key, value).map_err(anyhow::Error::msg)?;
    config.save()?;
    println!("{} Set {} = {}", style("✓").green(), key, value);
    Ok(())
}
