// ABOUTME: Server binary for the OpenRouter console backend
// ABOUTME: Loads configuration, initializes logging and storage, and serves HTTP
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # OpenRouter Console Server Binary
//!
//! Starts the console backend: SQLite storage, the OpenRouter relay, and
//! the HTTP API.

use anyhow::Result;
use clap::Parser;
use openrouter_console::{
    config::environment::{DatabaseUrl, ServerConfig},
    database::Database,
    logging,
    resources::ServerResources,
    server,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "openrouter-console")]
#[command(about = "Self-hosted console backend proxying chat completions to OpenRouter")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override database URL (e.g. sqlite:./console.db)
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ServerConfig::from_env()?;
    if let Some(http_port) = args.http_port {
        config.http_port = http_port;
    }
    if let Some(ref database_url) = args.database_url {
        config.database.url = DatabaseUrl::parse_url(database_url)?;
    }

    logging::init_from_env()?;

    info!("Starting OpenRouter console backend");
    info!("{}", config.summary());

    let database = Database::new(&config.database.url.to_connection_string()).await?;
    info!("database initialized and migrated");

    let resources = Arc::new(ServerResources::new(database, config).await?);

    server::serve(resources).await
}
