mod presenter;
mod surface;
mod timer;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use termbg_common::ipc::{default_socket_path, read_message, write_message};
use termbg_common::{
    BackendMessage, ClientMessage, DisplaySurface, ErrorReporting, FrontendMessage, ImageResolver,
    MemorySurface, TermbgError,
};
use termbg_common::error::IpcError;
use termbg_config::Config;
use tokio::io::BufReader;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::mpsc;
use crate::presenter::Presenter;
use crate::surface::{CssFileSurface, DEFAULT_SELECTOR};

#[derive(Parser)]
#[command(name = "termbg-window")]
#[command(about = "termbg-window (per-window background presenter)")]
#[command(version = "0.1.0")]
struct Args {
    /// Stylesheet the host injects into this window
    #[arg(long)]
    css_out: Option<PathBuf>,

    /// Container element the background is drawn behind
    #[arg(long, default_value = DEFAULT_SELECTOR)]
    selector: String,

    /// Settings file re-read on SIGHUP
    #[arg(long)]
    config: Option<PathBuf>,

    /// Daemon socket
    #[arg(long)]
    socket: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => Config::config_path()
            .map_err(|e| anyhow::anyhow!("Configuration error: {}", e.user_friendly_message()))?,
    };
    let socket_path = args.socket.unwrap_or_else(default_socket_path);

    let surface: Arc<dyn DisplaySurface> = match args.css_out {
        Some(path) => {
            log::info!("Writing background stylesheet to {:?}", path);
            Arc::new(CssFileSurface::new(path, args.selector))
        }
        None => {
            log::info!("No --css-out given, keeping display state in memory");
            Arc::new(MemorySurface::new())
        }
    };

    let stream = UnixStream::connect(&socket_path).await.map_err(|e| {
        let error = TermbgError::Ipc(IpcError::Connection { path: socket_path.clone(), source: e });
        anyhow::anyhow!(error.user_friendly_message())
    })?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    write_message(&mut write_half, &ClientMessage::Window(FrontendMessage::Register))
        .await
        .context("Failed to register with daemon")?;

    let config = match read_message::<_, BackendMessage<Config>>(&mut reader).await {
        Ok(Some(BackendMessage::Welcome { config })) => config,
        Ok(Some(other)) => anyhow::bail!("Expected welcome from daemon, got {:?}", other),
        Ok(None) => anyhow::bail!("Daemon closed the connection during registration"),
        Err(e) => anyhow::bail!("Registration failed: {}", e.user_friendly_message()),
    };
    log::info!("Registered with daemon at {:?}", socket_path);

    let (inbound_tx, inbound) = mpsc::unbounded_channel();
    let (outbox, outgoing) = mpsc::unbounded_channel();
    let reader_task = tokio::spawn(read_backend(reader, inbound_tx));
    let writer_task = tokio::spawn(write_frontend(write_half, outgoing));

    let presenter = Presenter::new(config, surface, ImageResolver::with_defaults(), outbox);
    let result = presenter.run(inbound, config_path).await;

    reader_task.abort();
    writer_task.abort();
    result
}

/// Socket reads stay in their own task; `read_line` is not cancel-safe.
async fn read_backend(
    mut reader: BufReader<OwnedReadHalf>,
    inbound: mpsc::UnboundedSender<BackendMessage<Config>>,
) {
    loop {
        match read_message(&mut reader).await {
            Ok(Some(message)) => {
                if inbound.send(message).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                e.log_error("Lost daemon connection");
                break;
            }
        }
    }
}

async fn write_frontend(
    mut write_half: OwnedWriteHalf,
    mut outgoing: mpsc::UnboundedReceiver<FrontendMessage>,
) {
    while let Some(message) = outgoing.recv().await {
        if let Err(e) = write_message(&mut write_half, &ClientMessage::Window(message)).await {
            e.log_error("Failed to write to daemon");
            break;
        }
    }
}
