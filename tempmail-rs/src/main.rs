use clap::Parser;
use std::path::PathBuf;
use tempmail_rs::api::ApiServer;
use tempmail_rs::config::Config;
use tempmail_rs::smtp::SmtpServer;
use tempmail_rs::storage::StorageSelector;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "tempmail-rs")]
#[command(about = "Disposable inbox mail receiver", long_about = None)]
struct Cli {
    /// Optional TOML configuration file (TEMPMAIL__* variables override it)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_deref())?;
    tempmail_rs::logging::init(&config.logging)?;
    config.validate()?;

    info!("Starting tempmail-rs");
    info!("  SMTP listening on: {}", config.smtp.listen_addr);
    info!("  HTTP listening on: {}", config.http.listen_addr);
    info!("  Allowed domains: {}", config.server.allowed_domains.join(", "));

    // Initialize storage; a misconfigured or unreachable backend is fatal
    let selector = StorageSelector::from_config(&config.storage).await?;
    info!("  Storage mode: {}", selector.mode());

    // Runs for the lifetime of the process
    let _eviction = selector.spawn_eviction_task();

    let api_server = ApiServer::new(
        selector.store(),
        config.server.allowed_domains.clone(),
        config.http.listen_addr.clone(),
    );
    let api_handle = tokio::spawn(async move { api_server.run().await });

    let smtp_server = SmtpServer::new(&config, selector.store());
    let smtp_handle = tokio::spawn(async move { smtp_server.run().await });

    // Wait for either server to exit (or error)
    tokio::select! {
        result = smtp_handle => {
            match result {
                Ok(Ok(())) => info!("SMTP server exited successfully"),
                Ok(Err(e)) => error!("SMTP server error: {}", e),
                Err(e) => error!("SMTP task panic: {}", e),
            }
        }
        result = api_handle => {
            match result {
                Ok(Ok(())) => info!("API server exited successfully"),
                Ok(Err(e)) => error!("API server error: {}", e),
                Err(e) => error!("API task panic: {}", e),
            }
        }
    }

    Ok(())
}
