//! Socket front of the coordinator.
//!
//! The first line of a connection decides its kind: a command gets exactly
//! one response line, a window registration turns the connection into a
//! long-lived session that carries messages both ways.

use tokio::io::BufReader;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, oneshot};
use termbg_common::ipc::{read_message, write_message};
use termbg_common::{BackendMessage, ClientMessage, ErrorReporting, FrontendMessage, IpcResponse};
use termbg_config::Config;
use crate::coordinator::CoordinatorEvent;

/// Accepts connections until the listener fails.
pub async fn serve(listener: UnixListener, events: mpsc::Sender<CoordinatorEvent>) -> anyhow::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let events = events.clone();
        tokio::spawn(async move {
            handle_connection(stream, events).await;
        });
    }
}

async fn handle_connection(stream: UnixStream, events: mpsc::Sender<CoordinatorEvent>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let first: ClientMessage = match read_message(&mut reader).await {
        Ok(Some(message)) => message,
        Ok(None) => return,
        Err(e) => {
            e.log_error("Rejected IPC connection");
            let response = IpcResponse::Error { message: e.user_friendly_message() };
            let _ = write_message(&mut write_half, &response).await;
            return;
        }
    };

    match first {
        ClientMessage::Command(command) => {
            let (reply, response) = oneshot::channel();
            if events.send(CoordinatorEvent::Command { command, reply }).await.is_err() {
                log::warn!("Coordinator stopped, dropping command");
                return;
            }
            let response = response.await.unwrap_or_else(|_| IpcResponse::Error {
                message: "Daemon is shutting down".to_string(),
            });
            if let Err(e) = write_message(&mut write_half, &response).await {
                e.log_error("Failed to write IPC response");
            }
        }
        ClientMessage::Window(FrontendMessage::Register) => {
            run_window_session(reader, write_half, events).await;
        }
        ClientMessage::Window(other) => {
            log::warn!("Window message before registration: {:?}", other);
        }
    }
}

async fn run_window_session(
    mut reader: BufReader<OwnedReadHalf>,
    write_half: OwnedWriteHalf,
    events: mpsc::Sender<CoordinatorEvent>,
) {
    let (sender, outgoing) = mpsc::unbounded_channel();
    if events.send(CoordinatorEvent::Register { sender }).await.is_err() {
        return;
    }
    let writer = tokio::spawn(write_outgoing(write_half, outgoing));

    loop {
        match read_message::<_, ClientMessage>(&mut reader).await {
            Ok(Some(ClientMessage::Window(message))) => {
                if events.send(CoordinatorEvent::Frontend(message)).await.is_err() {
                    break;
                }
            }
            Ok(Some(ClientMessage::Command(command))) => {
                log::warn!("Ignoring command {:?} on a window session", command);
            }
            Ok(None) => {
                log::debug!("Window session closed");
                break;
            }
            Err(e) => {
                e.log_error("Window session failed");
                break;
            }
        }
    }

    // Dropping the receiver makes the coordinator prune this window on its
    // next relay.
    writer.abort();
}

async fn write_outgoing(
    mut write_half: OwnedWriteHalf,
    mut outgoing: mpsc::UnboundedReceiver<BackendMessage<Config>>,
) {
    while let Some(message) = outgoing.recv().await {
        if let Err(e) = write_message(&mut write_half, &message).await {
            e.log_error("Failed to write to window");
            break;
        }
    }
}
