//! Control socket connection handling for the overlay process

use anyhow::{anyhow, Context, Result};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender, TrySendError};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{read_message, write_message, Broadcast, ControlServer, Reply, Request, ServerMessage};
use crate::constants::ipc;
use crate::controller::ControllerEvent;

static NEXT_SUBSCRIBER: AtomicU64 = AtomicU64::new(1);

/// Write half of a client connection, used for replies and pushes.
///
/// Frames are queued to a per-connection writer thread so a client that stops
/// reading never blocks the sender.
#[derive(Clone)]
pub struct Subscriber {
    id: u64,
    outbox: SyncSender<ServerMessage>,
}

impl Subscriber {
    fn new(stream: UnixStream) -> Result<Self> {
        let id = NEXT_SUBSCRIBER.fetch_add(1, Ordering::Relaxed);
        stream
            .set_write_timeout(Some(Duration::from_millis(ipc::WRITE_TIMEOUT_MS)))
            .context("Failed to set IPC write timeout")?;
        let (outbox, queue) = mpsc::sync_channel(ipc::OUTBOX_CAPACITY);

        thread::Builder::new()
            .name("ipc-writer".to_string())
            .spawn(move || run_writer(id, stream, queue))
            .context("Failed to spawn IPC writer thread")?;

        Ok(Self { id, outbox })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue a push; fails when the client has fallen behind or gone away
    pub fn push(&self, broadcast: &Broadcast) -> Result<()> {
        match self.outbox.try_send(ServerMessage::Push(broadcast.clone())) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(anyhow!("Client is not reading, outbox full")),
            Err(TrySendError::Disconnected(_)) => Err(anyhow!("Client connection closed")),
        }
    }

    fn reply(&self, reply: Reply) -> Result<()> {
        self.outbox
            .send(ServerMessage::Reply(reply))
            .map_err(|_| anyhow!("Client connection closed"))
    }
}

fn run_writer(id: u64, mut stream: UnixStream, queue: Receiver<ServerMessage>) {
    for message in queue {
        if let Err(e) = write_message(&mut stream, &message) {
            debug!(client = id, error = ?e, "IPC writer stopped");
            return;
        }
    }
}

/// Accept connections on `server` and feed their requests to the controller
pub fn spawn_listener(server: ControlServer, events: Sender<ControllerEvent>) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("ipc-listener".to_string())
        .spawn(move || {
            if let Err(e) = run_accept_loop(&server, &events) {
                error!(error = ?e, "IPC listener thread crashed");
            }
        })
        .context("Failed to spawn IPC listener thread")
}

fn run_accept_loop(server: &ControlServer, events: &Sender<ControllerEvent>) -> Result<()> {
    info!(socket = ?server.path(), "IPC listener started");

    loop {
        let stream = server.accept()?;
        let events = events.clone();
        thread::Builder::new()
            .name("ipc-connection".to_string())
            .spawn(move || {
                if let Err(e) = handle_connection(stream, &events) {
                    debug!(error = ?e, "IPC connection ended");
                }
            })
            .context("Failed to spawn IPC connection thread")?;
    }
}

fn handle_connection(stream: UnixStream, events: &Sender<ControllerEvent>) -> Result<()> {
    let mut reader = stream.try_clone().context("Failed to clone IPC stream")?;
    let subscriber = Subscriber::new(stream)?;
    info!(client = subscriber.id(), "IPC client connected");

    events
        .send(ControllerEvent::Subscribe(subscriber.clone()))
        .map_err(|_| anyhow!("Controller stopped"))?;

    loop {
        let request: Request = match read_message(&mut reader) {
            Ok(request) => request,
            Err(e) => {
                info!(client = subscriber.id(), reason = %e, "IPC client disconnected");
                return Ok(());
            }
        };
        debug!(client = subscriber.id(), ?request, "IPC request");

        if !request.expects_reply() {
            events
                .send(ControllerEvent::Request { request, reply: None })
                .map_err(|_| anyhow!("Controller stopped"))?;
            continue;
        }

        let (reply_tx, reply_rx) = mpsc::channel();
        events
            .send(ControllerEvent::Request {
                request,
                reply: Some(reply_tx),
            })
            .map_err(|_| anyhow!("Controller stopped"))?;

        let reply = match reply_rx.recv_timeout(Duration::from_millis(ipc::REPLY_TIMEOUT_MS)) {
            Ok(reply) => reply,
            Err(RecvTimeoutError::Timeout) => {
                warn!(client = subscriber.id(), "Controller did not reply in time");
                Reply::Error("timed out".to_string())
            }
            Err(RecvTimeoutError::Disconnected) => Reply::Error("request dropped".to_string()),
        };
        subscriber.reply(reply)?;
    }
}
