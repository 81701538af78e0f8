//! State enums for the TCP server and client.

/// Current state of the TCP server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ServerState {
    /// Server is not running.
    Stopped,
    /// Server is binding its listener.
    Starting,
    /// Server is listening for connections.
    Listening,
    /// Server is shutting down.
    Stopping,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::Stopped
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Starting => write!(f, "Starting"),
            Self::Listening => write!(f, "Listening"),
            Self::Stopping => write!(f, "Stopping"),
        }
    }
}

/// Current state of the TCP client connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientState {
    /// Not connected to any server.
    Disconnected,
    /// Currently attempting to connect.
    Connecting,
    /// Connected and ready to send/receive.
    Connected,
    /// Connection is being closed.
    Closing,
}

impl Default for ClientState {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl std::fmt::Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
            Self::Closing => write!(f, "Closing"),
        }
    }
}
