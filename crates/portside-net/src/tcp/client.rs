//! TCP client: outbound connection and its I/O task.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use portside_core::Signal;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};

use super::config::{TcpClientConfig, format_endpoint};
use super::state::ClientState;
use crate::error::{NetError, Result};
use crate::framing::{self, LineDecoder};
use crate::inbox::Inbox;

/// Command sent to the client's I/O task.
enum ClientCommand {
    Send(Vec<u8>),
    /// Close the connection; the optional sender is acknowledged once
    /// cleanup has finished.
    Close(Option<oneshot::Sender<()>>),
}

/// The endpoint a client connected to, as requested by the caller.
#[derive(Clone, Debug)]
struct RemoteEndpoint {
    host: String,
    port: u16,
    addr: SocketAddr,
}

/// State shared between the client handle and its I/O task.
///
/// The command sender lives here rather than on the handle so the I/O task
/// can clear it when the peer closes the connection, making a subsequent
/// `send` fail fast instead of queueing into a dead channel.
struct ClientShared {
    state: Mutex<ClientState>,
    remote: Mutex<Option<RemoteEndpoint>>,
    command_tx: Mutex<Option<mpsc::UnboundedSender<ClientCommand>>>,
    inbox: Arc<Inbox>,
    connected: Signal<SocketAddr>,
    disconnected: Signal<()>,
}

/// A TCP client for line-framed message exchange with one server.
///
/// One client manages at most one connection at a time. Connecting while
/// already connected fails with [`NetError::AlreadyConnected`]; disconnect
/// first to switch servers. Inbound messages land in the client's
/// [`Inbox`] with no source id.
///
/// # Example
///
/// ```ignore
/// let client = TcpClient::new(TcpClientConfig::new());
/// client.connect("127.0.0.1", 4520).await?;
///
/// client.inbox().message_received.connect(|message| {
///     println!("server says: {}", message.payload);
/// });
///
/// client.send("hello")?;
/// client.disconnect().await;
/// ```
pub struct TcpClient {
    config: TcpClientConfig,
    shared: Arc<ClientShared>,
}

impl TcpClient {
    /// Create a client with its own inbox.
    pub fn new(config: TcpClientConfig) -> Self {
        Self::with_inbox(config, Arc::new(Inbox::new()))
    }

    /// Create a client delivering into an existing inbox.
    pub fn with_inbox(config: TcpClientConfig, inbox: Arc<Inbox>) -> Self {
        Self {
            config,
            shared: Arc::new(ClientShared {
                state: Mutex::new(ClientState::Disconnected),
                remote: Mutex::new(None),
                command_tx: Mutex::new(None),
                inbox,
                connected: Signal::new(),
                disconnected: Signal::new(),
            }),
        }
    }

    /// Get the current client state.
    pub fn state(&self) -> ClientState {
        *self.shared.state.lock()
    }

    /// Check if the client is connected.
    pub fn is_connected(&self) -> bool {
        self.state() == ClientState::Connected
    }

    /// Get the address of the connected server, if any.
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.shared.remote.lock().as_ref().map(|r| r.addr)
    }

    /// The inbox receiving messages from the server.
    pub fn inbox(&self) -> &Arc<Inbox> {
        &self.shared.inbox
    }

    /// Signal emitted when a connection is established.
    pub fn connected(&self) -> &Signal<SocketAddr> {
        &self.shared.connected
    }

    /// Signal emitted when the connection goes away, whether through
    /// [`disconnect`](Self::disconnect) or because the peer closed it.
    pub fn disconnected(&self) -> &Signal<()> {
        &self.shared.disconnected
    }

    /// Connect to a server.
    ///
    /// `host` may be an IP address or a hostname. The attempt is bounded by
    /// the configured connect timeout and fails with [`NetError::Timeout`]
    /// when exceeded. Fails with [`NetError::AlreadyConnected`] when a
    /// connection already exists.
    pub async fn connect(&self, host: &str, port: u16) -> Result<()> {
        {
            let mut state = self.shared.state.lock();
            if *state != ClientState::Disconnected {
                return Err(NetError::AlreadyConnected);
            }
            *state = ClientState::Connecting;
        }

        let addr = format_endpoint(host, port);
        let connect = TcpStream::connect(&addr);
        let stream = match tokio::time::timeout(self.config.socket.connect_timeout, connect).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                *self.shared.state.lock() = ClientState::Disconnected;
                return Err(NetError::from_connect(&addr, &e));
            }
            Err(_) => {
                *self.shared.state.lock() = ClientState::Disconnected;
                return Err(NetError::Timeout);
            }
        };

        if let Err(e) = stream.set_nodelay(self.config.socket.no_delay) {
            tracing::warn!(
                target: "portside_net::tcp",
                addr = %addr,
                error = %e,
                "failed to set TCP_NODELAY"
            );
        }
        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(e) => {
                *self.shared.state.lock() = ClientState::Disconnected;
                return Err(NetError::Io(e.to_string()));
            }
        };

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (reader, writer) = stream.into_split();

        *self.shared.command_tx.lock() = Some(command_tx);
        *self.shared.remote.lock() = Some(RemoteEndpoint {
            host: host.to_string(),
            port,
            addr: peer_addr,
        });
        *self.shared.state.lock() = ClientState::Connected;

        tokio::spawn(io_loop(
            self.shared.clone(),
            reader,
            writer,
            command_rx,
            self.config.socket.read_buffer_size,
        ));

        tracing::info!(target: "portside_net::tcp", addr = %peer_addr, "client connected");
        self.shared.connected.emit(peer_addr);
        Ok(())
    }

    /// Disconnect from the server.
    ///
    /// Idempotent: returns `false` when there was no connection. On `true`,
    /// the socket has been shut down and the state reset before this
    /// returns.
    pub async fn disconnect(&self) -> bool {
        let tx = self.shared.command_tx.lock().take();
        let Some(tx) = tx else {
            return false;
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        if tx.send(ClientCommand::Close(Some(ack_tx))).is_err() {
            return false;
        }
        let _ = ack_rx.await;
        true
    }

    /// Queue one message for sending to the connected server.
    ///
    /// Fails with [`NetError::NotConnected`] when no connection exists.
    pub fn send(&self, message: &str) -> Result<()> {
        let tx = self.shared.command_tx.lock();
        match tx.as_ref() {
            Some(tx) => tx
                .send(ClientCommand::Send(framing::encode(message)))
                .map_err(|_| NetError::NotConnected),
            None => Err(NetError::NotConnected),
        }
    }

    /// Queue one message for sending, verifying the destination first.
    ///
    /// Fails with [`NetError::NotConnected`] when the client is not
    /// connected to exactly `host:port` as given at connect time. No
    /// implicit connection is made.
    pub fn send_to(&self, message: &str, host: &str, port: u16) -> Result<()> {
        {
            let remote = self.shared.remote.lock();
            match remote.as_ref() {
                Some(r) if r.host == host && r.port == port => {}
                _ => return Err(NetError::NotConnected),
            }
        }
        self.send(message)
    }
}

impl Drop for TcpClient {
    fn drop(&mut self) {
        // Let the I/O task shut itself down; nothing awaits the ack.
        if let Some(tx) = self.shared.command_tx.lock().take() {
            let _ = tx.send(ClientCommand::Close(None));
        }
    }
}

impl std::fmt::Debug for TcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpClient")
            .field("state", &self.state())
            .field("remote_addr", &self.remote_addr())
            .finish()
    }
}

/// Client I/O task: writes queued messages and reads until EOF, error, or
/// an explicit close.
async fn io_loop(
    shared: Arc<ClientShared>,
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    mut command_rx: mpsc::UnboundedReceiver<ClientCommand>,
    buffer_size: usize,
) {
    let mut decoder = LineDecoder::new();
    let mut buffer = vec![0u8; buffer_size];
    let mut close_ack: Option<oneshot::Sender<()>> = None;

    loop {
        tokio::select! {
            cmd = command_rx.recv() => {
                match cmd {
                    Some(ClientCommand::Send(data)) => {
                        if let Err(e) = writer.write_all(&data).await {
                            tracing::warn!(
                                target: "portside_net::tcp",
                                error = %e,
                                "write failed, closing connection"
                            );
                            break;
                        }
                    }
                    Some(ClientCommand::Close(ack)) => {
                        *shared.state.lock() = ClientState::Closing;
                        close_ack = ack;
                        break;
                    }
                    None => break, // Handle dropped
                }
            }

            result = reader.read(&mut buffer) => {
                match result {
                    Ok(0) => break, // EOF, server closed
                    Ok(n) => {
                        for payload in decoder.feed(&buffer[..n]) {
                            shared.inbox.deliver(None, payload);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            target: "portside_net::tcp",
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
    *shared.command_tx.lock() = None;
    *shared.remote.lock() = None;
    *shared.state.lock() = ClientState::Disconnected;
    shared.disconnected.emit(());

    if let Some(ack) = close_ack {
        let _ = ack.send(());
    }
    tracing::debug!(target: "portside_net::tcp", "client disconnected");
}
