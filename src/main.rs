// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use dotenv::dotenv;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carematch::api;
use carematch::config::Config;
use carematch::db::init_database;
use carematch::realtime::{ChangeHub, NotificationService};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if present
    dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,carematch=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::get();
    info!(
        host = %config.server.host,
        port = config.server.port,
        "initialized configuration"
    );

    let db = Arc::new(init_database().await?);
    info!("connected to database");

    // One hub wires stage writes in the API to every watcher.
    let hub = ChangeHub::new();

    let service = NotificationService::new(db.clone(), hub.clone());
    let service_handle = tokio::spawn(service.run());

    let api_db = db.clone();
    let api_hub = hub.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = api::start_api_server(api_db, api_hub).await {
            error!("API server error: {}", e);
        }
    });

    match signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => error!("failed to listen for shutdown signal: {}", e),
    }

    service_handle.abort();
    api_handle.abort();

    info!("carematch shutdown complete");
    Ok(())
}
