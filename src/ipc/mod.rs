//! IPC (Inter-Process Communication) via Unix sockets
//!
//! The overlay process listens on a control socket; the settings window (and
//! anything else speaking the protocol) connects to it. Frames are
//! length-prefixed JSON.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

mod messages;
pub mod server;

pub use messages::{Broadcast, Reply, Request, ServerMessage};

use crate::constants::{ipc, paths};

/// Default socket path (XDG_RUNTIME_DIR with fallback to cache)
pub fn default_socket_path() -> Result<PathBuf> {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return Ok(PathBuf::from(runtime_dir).join(paths::APP_DIR).join(paths::SOCKET_FILE));
    }

    let cache = dirs::cache_dir().context("Failed to determine cache directory (no XDG_RUNTIME_DIR or HOME)")?;
    Ok(cache.join(paths::APP_DIR).join(paths::SOCKET_FILE))
}

/// Connection to the overlay process.
///
/// A reader thread splits incoming frames into replies and pushes.
pub struct ControlClient {
    writer: UnixStream,
    replies: Receiver<Reply>,
    pushes: Receiver<Broadcast>,
}

impl ControlClient {
    pub fn connect_to(path: &Path) -> Result<Self> {
        let stream =
            UnixStream::connect(path).context(format!("Failed to connect to overlay at {}", path.display()))?;
        Self::from_stream(stream)
    }

    pub fn from_stream(stream: UnixStream) -> Result<Self> {
        let mut reader = stream.try_clone().context("Failed to clone IPC stream")?;
        let (reply_tx, replies) = mpsc::channel();
        let (push_tx, pushes) = mpsc::channel();

        thread::Builder::new()
            .name("ipc-client".to_string())
            .spawn(move || loop {
                match read_message::<ServerMessage, _>(&mut reader) {
                    Ok(ServerMessage::Reply(reply)) => {
                        if reply_tx.send(reply).is_err() {
                            break;
                        }
                    }
                    Ok(ServerMessage::Push(push)) => {
                        if push_tx.send(push).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(error = ?e, "IPC client reader closed");
                        break;
                    }
                }
            })
            .context("Failed to spawn IPC reader thread")?;

        Ok(Self {
            writer: stream,
            replies,
            pushes,
        })
    }

    /// Send a request and wait for its reply
    pub fn request(&mut self, request: Request) -> Result<Reply> {
        if !request.expects_reply() {
            self.fire(request)?;
            return Ok(Reply::Ack);
        }
        // Drop replies left behind by an earlier timed-out request
        while self.replies.try_recv().is_ok() {}

        write_message(&mut self.writer, &request)?;
        match self.replies.recv_timeout(Duration::from_millis(ipc::REPLY_TIMEOUT_MS)) {
            Ok(Reply::Error(message)) => Err(anyhow!("Overlay reported an error: {}", message)),
            Ok(reply) => Ok(reply),
            Err(RecvTimeoutError::Timeout) => Err(anyhow!("Timed out waiting for overlay reply")),
            Err(RecvTimeoutError::Disconnected) => Err(anyhow!("Overlay connection closed")),
        }
    }

    /// Send a fire-and-forget message
    pub fn fire(&mut self, request: Request) -> Result<()> {
        write_message(&mut self.writer, &request)
    }

    /// Next pushed message, if any (non-blocking)
    pub fn try_recv_push(&self) -> Result<Option<Broadcast>> {
        match self.pushes.try_recv() {
            Ok(push) => Ok(Some(push)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(anyhow!("Overlay connection closed")),
        }
    }
}

/// Server listener for the overlay process
pub struct ControlServer {
    listener: UnixListener,
    socket_path: PathBuf,
}

impl ControlServer {
    pub fn bind_to(socket_path: PathBuf) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create socket directory: {}", parent.display()))?;
        }

        // Remove stale socket if exists
        if socket_path.exists() {
            if UnixStream::connect(&socket_path).is_ok() {
                anyhow::bail!("Another keypet instance is already listening on {}", socket_path.display());
            }
            std::fs::remove_file(&socket_path)
                .context(format!("Failed to remove stale socket: {}", socket_path.display()))?;
        }

        let listener = UnixListener::bind(&socket_path)
            .context(format!("Failed to bind socket at {}", socket_path.display()))?;

        // Owner only
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o700))
                .context("Failed to set socket permissions")?;
        }

        Ok(Self {
            listener,
            socket_path,
        })
    }

    /// Accept incoming connection (blocking)
    pub fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self.listener.accept().context("Failed to accept IPC connection")?;
        Ok(stream)
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for ControlServer {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            warn!(socket = %self.socket_path.display(), error = %e, "Failed to remove socket file");
        }
    }
}

/// Write length-prefixed message to stream
pub fn write_message<T: Serialize, W: Write>(stream: &mut W, msg: &T) -> Result<()> {
    let json = serde_json::to_vec(msg).context("Failed to serialize message to JSON")?;
    if json.len() > ipc::MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", json.len(), ipc::MAX_MESSAGE_SIZE));
    }

    // Length prefix (u32 little-endian)
    let len = json.len() as u32;
    stream
        .write_all(&len.to_le_bytes())
        .context("Failed to write message length")?;
    stream.write_all(&json).context("Failed to write message payload")?;
    stream.flush().context("Failed to flush stream")?;

    Ok(())
}

/// Read length-prefixed message from stream
pub fn read_message<T: for<'de> Deserialize<'de>, R: Read>(stream: &mut R) -> Result<T> {
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .context("Failed to read message length")?;
    let len = u32::from_le_bytes(len_buf) as usize;

    // Sanity check (prevent DoS via huge allocation)
    if len > ipc::MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", len, ipc::MAX_MESSAGE_SIZE));
    }

    let mut json_buf = vec![0u8; len];
    stream
        .read_exact(&mut json_buf)
        .context("Failed to read message payload")?;

    serde_json::from_slice(&json_buf).context("Failed to deserialize message from JSON")
}
