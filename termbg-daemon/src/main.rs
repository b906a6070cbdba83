mod coordinator;
mod menu;
mod server;
mod viewer;

use anyhow::Result;
use termbg_common::{ErrorReporting, IpcServer};
use termbg_config::{Config, ConfigStore};
use tokio::sync::mpsc;
use crate::coordinator::{Coordinator, CHANNEL_BUFFER_SIZE};
use crate::viewer::SystemOpener;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    log::info!("Starting termbg daemon...");

    let config_path = Config::config_path()
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e.user_friendly_message()))?;

    let config = Config::load_from_path(&config_path)
        .map_err(|e| {
            log::error!("Configuration error: {}", e.user_friendly_message());
            anyhow::anyhow!("Configuration error: {}", e.user_friendly_message())
        })?;

    log::info!("Configuration loaded successfully");

    // The daemon relays its own writes explicitly, so its store is not observed.
    let coordinator = Coordinator::new(ConfigStore::load(config), Some(config_path), Box::new(SystemOpener));

    let (events, receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let actor = tokio::spawn(coordinator.run(receiver));

    let server = IpcServer::new();
    let listener = server.bind()?;

    log::info!("Daemon started, waiting for windows");

    tokio::select! {
        result = server::serve(listener, events) => {
            if let Err(e) = result {
                log::error!("IPC server error: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            log::info!("Received interrupt, shutting down");
        }
    }

    actor.abort();
    Ok(())
}
