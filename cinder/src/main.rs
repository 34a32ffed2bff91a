//! The cinder server binary.

use std::{env, path::PathBuf};

use anyhow::Context;
use cinder::{CinderServer, logger};
use cinder_core::config::WorldConfig;
use tokio::{signal, spawn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init()?;

    let path = env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from("world.json5"), PathBuf::from);
    let config = WorldConfig::load_or_create(&path)
        .with_context(|| format!("loading {}", path.display()))?;

    let server = CinderServer::new(config)?;
    let cancel_token = server.cancel_token.clone();
    spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => log::info!("Received Ctrl-C, shutting down"),
            Err(err) => log::error!("Failed to listen for Ctrl-C: {err}"),
        }
        cancel_token.cancel();
    });

    server.run().await;
    Ok(())
}
