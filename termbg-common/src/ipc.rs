use std::path::{Path, PathBuf};
use std::os::unix::net::UnixStream;
use std::io::{BufRead, BufReader, Write};
use serde::{Serialize, Deserialize};
use serde::de::DeserializeOwned;
use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixListener;
use crate::error::{IpcError, TermbgError};

const SOCKET_NAME: &str = "termbg.sock";

/// `$TERMBG_SOCKET`, else `termbg.sock` in the runtime directory.
pub fn default_socket_path() -> PathBuf {
    if let Some(path) = std::env::var_os("TERMBG_SOCKET") {
        return PathBuf::from(path);
    }
    dirs::runtime_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(SOCKET_NAME)
}

/// First line of every connection decides what kind of peer it is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientMessage {
    Command(IpcCommand),
    Window(FrontendMessage),
}

/// Window to daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FrontendMessage {
    Register,
    /// Ask every window to rotate.
    ChangeBackground,
    /// What this window now shows, 0 to 2 absolute paths.
    SetImagePath { images: Vec<PathBuf> },
}

/// Daemon to window. `C` is the configuration payload type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BackendMessage<C> {
    Welcome { config: C },
    /// Rotate now; a present config replaces the window's snapshot first.
    ChangeBackground { config: Option<C> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IpcCommand {
    Menu,
    SelectProfile { name: String },
    NextImage,
    ViewCurrentImage,
    Reload,
    Status,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IpcResponse {
    Success { message: String },
    Error { message: String },
    Menu(MenuView),
    Status(DaemonStatus),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuView {
    pub profiles: Vec<MenuEntry>,
    pub next_image_accelerator: String,
    pub can_view_current: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub name: String,
    pub checked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub default_profile: String,
    pub windows: usize,
    pub current_images: Vec<PathBuf>,
    pub interval_secs: Option<u64>,
}

/// Writes one message as a JSON line.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> crate::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await.map_err(|e| {
        log::debug!("IPC write failed: {}", e);
        TermbgError::Ipc(IpcError::Send)
    })?;
    writer.flush().await.map_err(|_| TermbgError::Ipc(IpcError::Send))?;
    Ok(())
}

/// Reads one JSON line. `Ok(None)` means the peer closed the connection.
pub async fn read_message<R, T>(reader: &mut R) -> crate::Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    let read = reader.read_line(&mut line).await.map_err(|e| {
        log::debug!("IPC read failed: {}", e);
        TermbgError::Ipc(IpcError::Receive)
    })?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line.trim_end())?))
}

pub struct IpcClient {
    socket_path: PathBuf,
}

impl IpcClient {
    pub fn new() -> Self {
        Self::with_socket(default_socket_path())
    }

    pub fn with_socket(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    pub fn send_command(&self, command: IpcCommand) -> anyhow::Result<IpcResponse> {
        let mut stream = UnixStream::connect(&self.socket_path).map_err(|e| {
            TermbgError::Ipc(IpcError::Connection { path: self.socket_path.clone(), source: e })
        })?;

        let mut command_json = serde_json::to_string(&ClientMessage::Command(command))
            .with_context(|| "Failed to serialize command")?;
        command_json.push('\n');

        stream.write_all(command_json.as_bytes())
            .with_context(|| "Failed to send command to daemon")?;
        stream.shutdown(std::net::Shutdown::Write)
            .with_context(|| "Failed to shutdown write stream")?;

        let mut response = String::new();
        BufReader::new(stream).read_line(&mut response)
            .with_context(|| "Failed to read response from daemon")?;
        if response.is_empty() {
            return Err(TermbgError::Ipc(IpcError::DaemonUnresponsive).into());
        }

        let ipc_response: IpcResponse = serde_json::from_str(response.trim_end())
            .with_context(|| "Failed to deserialize response")?;

        Ok(ipc_response)
    }
}

impl Default for IpcClient {
    fn default() -> Self {
        Self::new()
    }
}

pub struct IpcServer {
    socket_path: PathBuf,
}

impl IpcServer {
    pub fn new() -> Self {
        Self::with_socket(default_socket_path())
    }

    pub fn with_socket(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Binds the listening socket, replacing a stale one.
    pub fn bind(&self) -> anyhow::Result<UnixListener> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
                .with_context(|| "Failed to remove existing socket")?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| "Failed to create socket directory")?;
        }

        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("Failed to bind to socket {:?}", self.socket_path))?;

        log::info!("IPC server listening on {:?}", self.socket_path);
        Ok(listener)
    }
}

impl Default for IpcServer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::BufReader as AsyncBufReader;

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_string(&FrontendMessage::SetImagePath {
            images: vec![PathBuf::from("/a.jpg")],
        })
        .unwrap();
        assert_eq!(json, r#"{"type":"set-image-path","images":["/a.jpg"]}"#);

        let json = serde_json::to_string(&BackendMessage::<u32>::ChangeBackground { config: None }).unwrap();
        assert_eq!(json, r#"{"type":"change-background","config":null}"#);

        let json = serde_json::to_string(&ClientMessage::Window(FrontendMessage::Register)).unwrap();
        assert_eq!(json, r#"{"window":{"type":"register"}}"#);
    }

    #[tokio::test]
    async fn test_read_message_reports_eof() {
        let mut reader = AsyncBufReader::new(&b""[..]);
        let message: Option<FrontendMessage> = read_message(&mut reader).await.unwrap();
        assert!(message.is_none());
    }

    #[tokio::test]
    async fn test_read_message_rejects_garbage() {
        let mut reader = AsyncBufReader::new(&b"{not json}\n"[..]);
        let result: crate::Result<Option<FrontendMessage>> = read_message(&mut reader).await;
        assert!(matches!(result, Err(TermbgError::Ipc(IpcError::InvalidMessage { .. }))));
    }

    #[tokio::test]
    async fn test_client_server_roundtrip() {
        let temp_dir = tempdir().unwrap();
        let server = IpcServer::with_socket(temp_dir.path().join("test.sock"));
        let listener = server.bind().unwrap();
        let socket_path = server.socket_path().to_path_buf();

        let serve = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = AsyncBufReader::new(read_half);
            let message: ClientMessage = read_message(&mut reader).await.unwrap().unwrap();
            assert_eq!(message, ClientMessage::Command(IpcCommand::NextImage));
            write_message(&mut write_half, &IpcResponse::Success { message: "rotated".to_string() })
                .await
                .unwrap();
        });

        let response = tokio::task::spawn_blocking(move || {
            IpcClient::with_socket(socket_path).send_command(IpcCommand::NextImage)
        })
        .await
        .unwrap()
        .unwrap();

        serve.await.unwrap();
        assert_eq!(response, IpcResponse::Success { message: "rotated".to_string() });
    }

    #[test]
    fn test_client_without_daemon() {
        let temp_dir = tempdir().unwrap();
        let client = IpcClient::with_socket(temp_dir.path().join("missing.sock"));
        let error = client.send_command(IpcCommand::Status).unwrap_err();

        match error.downcast_ref::<TermbgError>() {
            Some(TermbgError::Ipc(IpcError::Connection { .. })) => {}
            other => panic!("Expected connection error, got {:?}", other),
        }
    }
}
