mod config;
mod diag;
mod dispatch;
mod line;
mod record;
mod server;
mod store;
mod vision;
mod webhook;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::diag::Diagnostics;
use crate::dispatch::Dispatcher;
use crate::line::LineClient;
use crate::store::RecordStore;
use crate::vision::VisionClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,runlogbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Model: {}", config.openai.model);
    info!("  Store: {}", config.store.database_path.display());
    info!("  Port: {}", config.server.port);

    let store = RecordStore::open(&config.store.database_path)?;
    let diag = Diagnostics::new(store.connection());

    let line = Arc::new(LineClient::new(config.line.clone())?);
    let vision = Arc::new(VisionClient::new(config.openai.clone(), diag.clone())?);

    // The LINE client covers both ends of the chain: attachment
    // download in, reply delivery out.
    let dispatcher = Arc::new(Dispatcher::new(
        line.clone(),
        vision,
        Arc::new(store),
        line,
        diag,
    ));

    info!("Webhook pipeline is starting...");
    server::run(dispatcher, config.server.port).await
}
