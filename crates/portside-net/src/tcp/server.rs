//! TCP server: bind, accept loop, lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use portside_core::Signal;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

use super::config::TcpServerConfig;
use super::connection::{ConnectionId, TcpConnection};
use super::registry::ConnectionRegistry;
use super::state::ServerState;
use crate::error::{NetError, Result};
use crate::inbox::Inbox;

/// Command sent to the accept-loop task.
enum ServerCommand {
    /// Shut down; the sender is acknowledged once cleanup has finished.
    Stop(oneshot::Sender<()>),
}

/// State shared between the server handle and its accept-loop task.
struct ServerShared {
    state: Mutex<ServerState>,
    local_addr: Mutex<Option<SocketAddr>>,
    registry: ConnectionRegistry,
    inbox: Arc<Inbox>,
    connection_opened: Signal<ConnectionId>,
    connection_closed: Signal<ConnectionId>,
}

/// A TCP server accepting line-framed message connections.
///
/// The server is an owned handle, not a global: create one, call
/// [`start`](Self::start), and share it by reference. Starting twice fails
/// with [`NetError::AlreadyRunning`] rather than silently reusing a
/// singleton.
///
/// Each accepted connection gets its own I/O task; inbound messages land in
/// the server's [`Inbox`]. Connection lifecycle is observable through the
/// [`connection_opened`](Self::connection_opened) and
/// [`connection_closed`](Self::connection_closed) signals.
///
/// # Example
///
/// ```ignore
/// let server = TcpServer::new(TcpServerConfig::new(0));
/// let addr = server.start().await?;
/// println!("listening on {addr}");
///
/// server.inbox().message_received.connect(|message| {
///     println!("[{:?}] {}", message.source, message.payload);
/// });
///
/// server.broadcast("welcome");
/// server.stop().await;
/// ```
pub struct TcpServer {
    config: TcpServerConfig,
    shared: Arc<ServerShared>,
    command_tx: Mutex<Option<mpsc::UnboundedSender<ServerCommand>>>,
    is_running: AtomicBool,
}

impl TcpServer {
    /// Create a server with its own inbox.
    pub fn new(config: TcpServerConfig) -> Self {
        Self::with_inbox(config, Arc::new(Inbox::new()))
    }

    /// Create a server delivering into an existing inbox.
    ///
    /// Use this to merge server and client messages into one stream.
    pub fn with_inbox(config: TcpServerConfig, inbox: Arc<Inbox>) -> Self {
        Self {
            config,
            shared: Arc::new(ServerShared {
                state: Mutex::new(ServerState::Stopped),
                local_addr: Mutex::new(None),
                registry: ConnectionRegistry::new(),
                inbox,
                connection_opened: Signal::new(),
                connection_closed: Signal::new(),
            }),
            command_tx: Mutex::new(None),
            is_running: AtomicBool::new(false),
        }
    }

    /// Get the current server state.
    pub fn state(&self) -> ServerState {
        *self.shared.state.lock()
    }

    /// Check if the server is listening.
    pub fn is_listening(&self) -> bool {
        self.state() == ServerState::Listening
    }

    /// Get the actual bound address, if listening.
    ///
    /// Useful when binding port 0 to discover the assigned port.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.shared.local_addr.lock()
    }

    /// Number of currently connected clients.
    pub fn client_count(&self) -> usize {
        self.shared.registry.count()
    }

    /// The registry of accepted connections.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.shared.registry
    }

    /// The inbox receiving messages from all connections.
    pub fn inbox(&self) -> &Arc<Inbox> {
        &self.shared.inbox
    }

    /// Signal emitted when a client connection is accepted.
    pub fn connection_opened(&self) -> &Signal<ConnectionId> {
        &self.shared.connection_opened
    }

    /// Signal emitted when a client connection goes away.
    pub fn connection_closed(&self) -> &Signal<ConnectionId> {
        &self.shared.connection_closed
    }

    /// Send a message to every connected client.
    ///
    /// Failures on individual connections are isolated; returns the number
    /// of clients the message was queued for.
    pub fn broadcast(&self, message: &str) -> usize {
        self.shared.registry.broadcast(message)
    }

    /// Send a message to one client.
    pub fn send_to(&self, id: ConnectionId, message: &str) -> Result<()> {
        self.shared.registry.send_to(id, message)
    }

    /// Close all client connections, keeping the listener running.
    ///
    /// Returns the number of connections closed.
    pub fn disconnect_all_clients(&self) -> usize {
        self.shared.registry.disconnect_all()
    }

    /// Bind the listener and start accepting connections.
    ///
    /// Binding happens before this returns, so bind failures
    /// ([`NetError::AddressInUse`], [`NetError::PermissionDenied`]) surface
    /// directly to the caller. On success the accept loop runs on its own
    /// task and the actually-bound address is returned.
    pub async fn start(&self) -> Result<SocketAddr> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Err(NetError::AlreadyRunning);
        }
        *self.shared.state.lock() = ServerState::Starting;

        let bind_addr = self.config.bind_addr();
        let listener = match TcpListener::bind(&bind_addr).await {
            Ok(listener) => listener,
            Err(e) => {
                self.reset_stopped();
                return Err(NetError::from_bind(&bind_addr, &e));
            }
        };
        let local_addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                self.reset_stopped();
                return Err(NetError::Io(e.to_string()));
            }
        };

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        *self.command_tx.lock() = Some(command_tx);
        *self.shared.local_addr.lock() = Some(local_addr);
        *self.shared.state.lock() = ServerState::Listening;

        tokio::spawn(accept_loop(
            listener,
            local_addr,
            self.config.clone(),
            self.shared.clone(),
            command_rx,
        ));

        tracing::info!(target: "portside_net::tcp", addr = %local_addr, "server listening");
        Ok(local_addr)
    }

    /// Stop the server, closing the listener and every connection.
    ///
    /// Idempotent: returns `false` when the server was not running. On
    /// `true`, the listener has been released and the registry cleared
    /// before this returns, so the port is immediately rebindable.
    pub async fn stop(&self) -> bool {
        let tx = self.command_tx.lock().take();
        let Some(tx) = tx else {
            return false;
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        if tx.send(ServerCommand::Stop(ack_tx)).is_err() {
            self.is_running.store(false, Ordering::SeqCst);
            return false;
        }
        let _ = ack_rx.await;
        self.is_running.store(false, Ordering::SeqCst);
        true
    }

    fn reset_stopped(&self) {
        *self.shared.state.lock() = ServerState::Stopped;
        self.is_running.store(false, Ordering::SeqCst);
    }
}

impl Drop for TcpServer {
    fn drop(&mut self) {
        // Let the accept loop shut itself down; nothing awaits the ack.
        if let Some(tx) = self.command_tx.lock().take() {
            let (ack_tx, _) = oneshot::channel();
            let _ = tx.send(ServerCommand::Stop(ack_tx));
        }
    }
}

impl std::fmt::Debug for TcpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpServer")
            .field("bind_addr", &self.config.bind_addr())
            .field("state", &self.state())
            .field("clients", &self.client_count())
            .finish()
    }
}

/// Accept-loop task: accepts connections, tracks their teardown, and
/// handles shutdown. Accept errors never take the loop down.
async fn accept_loop(
    listener: TcpListener,
    local_addr: SocketAddr,
    config: TcpServerConfig,
    shared: Arc<ServerShared>,
    mut command_rx: mpsc::UnboundedReceiver<ServerCommand>,
) {
    let (closed_tx, mut closed_rx) = mpsc::unbounded_channel::<ConnectionId>();
    let mut stop_ack: Option<oneshot::Sender<()>> = None;

    loop {
        tokio::select! {
            cmd = command_rx.recv() => {
                match cmd {
                    Some(ServerCommand::Stop(ack)) => {
                        stop_ack = Some(ack);
                        break;
                    }
                    None => break, // Handle dropped
                }
            }

            // A connection's I/O task finished; drop it from the registry.
            Some(id) = closed_rx.recv() => {
                if shared.registry.remove(id).is_some() {
                    shared.connection_closed.emit(id);
                }
            }

            result = listener.accept() => {
                match result {
                    Ok((stream, peer_addr)) => {
                        if let Some(max) = config.max_connections
                            && shared.registry.count() >= max
                        {
                            tracing::warn!(
                                target: "portside_net::tcp",
                                peer = %peer_addr,
                                max,
                                "connection rejected: at capacity"
                            );
                            drop(stream);
                            continue;
                        }

                        if let Err(e) = stream.set_nodelay(config.socket.no_delay) {
                            tracing::warn!(
                                target: "portside_net::tcp",
                                peer = %peer_addr,
                                error = %e,
                                "failed to set TCP_NODELAY"
                            );
                        }

                        let (reader, writer) = stream.into_split();
                        let connection = TcpConnection::spawn(
                            reader,
                            writer,
                            local_addr,
                            peer_addr,
                            &config.socket,
                            shared.inbox.clone(),
                            closed_tx.clone(),
                        );
                        let id = connection.id();
                        shared.registry.insert(connection);
                        shared.connection_opened.emit(id);

                        tracing::debug!(
                            target: "portside_net::tcp",
                            id = %id,
                            peer = %peer_addr,
                            "connection accepted"
                        );
                    }
                    Err(e) => {
                        tracing::warn!(target: "portside_net::tcp", error = %e, "accept failed");
                    }
                }
            }
        }
    }

    *shared.state.lock() = ServerState::Stopping;
    // Release the port before acknowledging the stop.
    drop(listener);
    shared.registry.disconnect_all();
    *shared.local_addr.lock() = None;
    *shared.state.lock() = ServerState::Stopped;

    if let Some(ack) = stop_ack {
        let _ = ack.send(());
    }
    tracing::info!(target: "portside_net::tcp", "server stopped");
}
