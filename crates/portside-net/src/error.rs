//! Error types for the networking crate.

use std::io;

/// A specialized Result type for socket operations.
pub type Result<T> = std::result::Result<T, NetError>;

/// Errors surfaced by the TCP server, client, and network queries.
///
/// The variants fall into four groups:
///
/// - bind errors ([`AddressInUse`](Self::AddressInUse),
///   [`PermissionDenied`](Self::PermissionDenied)) surface from
///   `TcpServer::start`;
/// - state errors ([`AlreadyRunning`](Self::AlreadyRunning),
///   [`AlreadyConnected`](Self::AlreadyConnected),
///   [`NotConnected`](Self::NotConnected)) enforce the one-server,
///   one-client-connection policy;
/// - connect errors ([`ConnectionRefused`](Self::ConnectionRefused),
///   [`HostUnreachable`](Self::HostUnreachable), [`Timeout`](Self::Timeout))
///   surface from `TcpClient::connect`;
/// - [`Io`](Self::Io) covers read/write failures on an established
///   connection. These are isolated: they close the affected connection and
///   never propagate to the accept loop or to sends on other connections.
///
/// Errors carry string payloads rather than `io::Error` sources so they
/// stay `Clone` and can travel through signals.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetError {
    /// The requested bind address is already in use.
    #[error("address {0} is already in use")]
    AddressInUse(String),

    /// Binding the address requires privileges the process lacks.
    #[error("permission denied binding {0}")]
    PermissionDenied(String),

    /// The server has already been started.
    #[error("server is already running")]
    AlreadyRunning,

    /// The client already has an active connection.
    #[error("client is already connected")]
    AlreadyConnected,

    /// No active connection to send on or disconnect from.
    #[error("not connected to a server")]
    NotConnected,

    /// The remote host refused the connection.
    #[error("connection refused by {0}")]
    ConnectionRefused(String),

    /// The remote host or network is unreachable.
    #[error("host unreachable: {0}")]
    HostUnreachable(String),

    /// The operation did not complete within its timeout.
    #[error("operation timed out")]
    Timeout,

    /// No usable network interface was found.
    #[error("no usable network interface")]
    Unavailable,

    /// I/O failure on an established connection.
    #[error("I/O error: {0}")]
    Io(String),
}

impl NetError {
    /// Map a bind failure to the error taxonomy.
    pub(crate) fn from_bind(addr: &str, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::AddrInUse => Self::AddressInUse(addr.to_string()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(addr.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }

    /// Map an outbound connect failure to the error taxonomy.
    pub(crate) fn from_connect(addr: &str, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused(addr.to_string()),
            io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
                Self::HostUnreachable(addr.to_string())
            }
            io::ErrorKind::TimedOut => Self::Timeout,
            _ => Self::Io(err.to_string()),
        }
    }
}
