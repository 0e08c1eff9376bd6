// Standalone MCP server binary

use anyhow::{Context, Result};
use clap::Parser;
use guardian_news_core::{GuardianClient, NewsCaches, NewsConfig, NewsService};
use guardian_news_mcp::{news_registry, McpServer};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "guardian-news-mcp", version, about = "Guardian news tools over MCP stdio")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, env = "GUARDIAN_NEWS_CONFIG", default_value = "guardian-news.toml")]
    config: PathBuf,
}

/// A `.env` load error worth reporting; a missing file is the normal case.
fn dotenv_failure<T>(result: &dotenvy::Result<T>) -> Option<&dotenvy::Error> {
    match result {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads env-backed flags
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "guardian_news=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    tracing::info!("Guardian News MCP Server starting...");
    if let Ok(path) = &dotenv {
        tracing::info!(path = %path.display(), "Loaded environment file");
    } else if let Some(e) = dotenv_failure(&dotenv) {
        tracing::warn!(error = %e, "Ignoring unreadable .env file");
    }

    let mut config = NewsConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    config.apply_env(|name| std::env::var(name).ok());

    if config.guardian.api_key.is_none() {
        tracing::warn!("GUARDIAN_API_KEY is not set; Guardian API tools will fail until it is");
    }

    let client = GuardianClient::new(&config.guardian, &config.scrape)
        .context("Failed to create Guardian client")?;
    let caches = Arc::new(NewsCaches::new(&config.cache));
    let service = Arc::new(NewsService::new(Arc::new(client), caches, &config));

    let registry = news_registry(service, config.guardian.api_key.clone());
    tracing::info!("Registered {} tools", registry.len());

    // Start MCP server
    let server = McpServer::new(registry);
    server.start().await?;

    Ok(())
}
