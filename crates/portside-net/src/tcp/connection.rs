//! Accepted-connection type and its read loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;

use super::config::TcpSocketConfig;
use crate::error::{NetError, Result};
use crate::framing::{self, LineDecoder};
use crate::inbox::Inbox;

/// Unique identifier for an accepted connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next process-unique id.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw id value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Command sent to the connection's I/O task.
enum ConnectionCommand {
    Send(Vec<u8>),
    Close,
}

/// A single accepted client connection.
///
/// Owned by the server's `ConnectionRegistry` and destroyed when the peer
/// disconnects, a read/write error occurs, or the registry closes it. All
/// socket I/O happens on a dedicated task; `send` queues a framed message
/// for that task to write.
pub struct TcpConnection {
    id: ConnectionId,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
    command_tx: Mutex<Option<mpsc::UnboundedSender<ConnectionCommand>>>,
    is_open: AtomicBool,
}

impl TcpConnection {
    /// Wrap an accepted stream and start its I/O task.
    ///
    /// Decoded messages are delivered to `inbox` tagged with this
    /// connection's id; `closed_tx` notifies the accept loop when the task
    /// exits so the registry entry can be removed.
    pub(crate) fn spawn(
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        local_addr: SocketAddr,
        peer_addr: SocketAddr,
        config: &TcpSocketConfig,
        inbox: Arc<Inbox>,
        closed_tx: mpsc::UnboundedSender<ConnectionId>,
    ) -> Arc<Self> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let connection = Arc::new(Self {
            id: ConnectionId::next(),
            local_addr,
            peer_addr,
            command_tx: Mutex::new(Some(command_tx)),
            is_open: AtomicBool::new(true),
        });

        tokio::spawn(connection.clone().io_loop(
            reader,
            writer,
            command_rx,
            config.read_buffer_size,
            inbox,
            closed_tx,
        ));

        connection
    }

    /// Get the unique connection id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the local socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get the peer socket address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Check if the connection is still open.
    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::SeqCst)
    }

    /// Queue one framed message for sending to the peer.
    pub fn send(&self, message: &str) -> Result<()> {
        let tx = self.command_tx.lock();
        match tx.as_ref() {
            Some(tx) => tx
                .send(ConnectionCommand::Send(framing::encode(message)))
                .map_err(|_| NetError::Io("connection closed".to_string())),
            None => Err(NetError::Io("connection closed".to_string())),
        }
    }

    /// Close the connection. Idempotent.
    pub fn close(&self) {
        if let Some(tx) = self.command_tx.lock().take() {
            let _ = tx.send(ConnectionCommand::Close);
        }
        self.is_open.store(false, Ordering::SeqCst);
    }

    /// Per-connection I/O task: writes queued messages and reads until EOF,
    /// error, or an explicit close. A failure here only ever takes down this
    /// connection.
    async fn io_loop(
        self: Arc<Self>,
        mut reader: OwnedReadHalf,
        mut writer: OwnedWriteHalf,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        buffer_size: usize,
        inbox: Arc<Inbox>,
        closed_tx: mpsc::UnboundedSender<ConnectionId>,
    ) {
        let mut decoder = LineDecoder::new();
        let mut buffer = vec![0u8; buffer_size];

        loop {
            tokio::select! {
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(ConnectionCommand::Send(data)) => {
                            if let Err(e) = writer.write_all(&data).await {
                                tracing::warn!(
                                    target: "portside_net::tcp",
                                    id = %self.id,
                                    error = %e,
                                    "write failed, closing connection"
                                );
                                break;
                            }
                        }
                        Some(ConnectionCommand::Close) | None => break,
                    }
                }

                result = reader.read(&mut buffer) => {
                    match result {
                        Ok(0) => break, // EOF, peer closed
                        Ok(n) => {
                            for payload in decoder.feed(&buffer[..n]) {
                                inbox.deliver(Some(self.id), payload);
                            }
                        }
                        Err(e) => {
                            tracing::warn!(
                                target: "portside_net::tcp",
                                id = %self.id,
                                error = %e,
                                "read failed, closing connection"
                            );
                            break;
                        }
                    }
                }
            }
        }

        let _ = writer.shutdown().await;
        *self.command_tx.lock() = None;
        self.is_open.store(false, Ordering::SeqCst);
        let _ = closed_tx.send(self.id);

        tracing::debug!(
            target: "portside_net::tcp",
            id = %self.id,
            peer = %self.peer_addr,
            "connection closed"
        );
    }
}

impl std::fmt::Debug for TcpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpConnection")
            .field("id", &self.id)
            .field("local_addr", &self.local_addr)
            .field("peer_addr", &self.peer_addr)
            .field("is_open", &self.is_open())
            .finish()
    }
}
