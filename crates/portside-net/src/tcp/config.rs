//! Configuration types for the TCP server and client.

use std::time::Duration;

/// Join a host and port into a connectable address string.
///
/// IPv6 literals are bracketed so the port separator stays unambiguous.
pub(crate) fn format_endpoint(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Socket-level options shared by client and accepted connections.
#[derive(Clone, Debug)]
pub struct TcpSocketConfig {
    /// Enable TCP_NODELAY (disable Nagle's algorithm).
    pub no_delay: bool,
    /// Read buffer size in bytes.
    pub read_buffer_size: usize,
    /// Bound on how long an outbound connect may take.
    pub connect_timeout: Duration,
}

impl Default for TcpSocketConfig {
    fn default() -> Self {
        Self {
            no_delay: false,
            read_buffer_size: 8192,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl TcpSocketConfig {
    /// Create a new socket configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable TCP_NODELAY.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.no_delay = enabled;
        self
    }

    /// Set the read buffer size.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Configuration for a TCP server.
#[derive(Clone, Debug)]
pub struct TcpServerConfig {
    /// The address to bind to.
    pub bind_address: String,
    /// The port to listen on. Port 0 asks the OS for a free port; the
    /// address actually bound is returned by `TcpServer::start`.
    pub port: u16,
    /// Socket-level options applied to accepted connections.
    pub socket: TcpSocketConfig,
    /// Cap on concurrent accepted connections. Surplus connections are
    /// closed immediately after accept. `None` means unlimited.
    pub max_connections: Option<usize>,
}

impl TcpServerConfig {
    /// Create a new server configuration listening on all interfaces.
    pub fn new(port: u16) -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port,
            socket: TcpSocketConfig::default(),
            max_connections: None,
        }
    }

    /// Set the address to bind to.
    pub fn bind_address(mut self, address: impl Into<String>) -> Self {
        self.bind_address = address.into();
        self
    }

    /// Set socket options for accepted connections.
    pub fn socket_config(mut self, config: TcpSocketConfig) -> Self {
        self.socket = config;
        self
    }

    /// Enable TCP_NODELAY for accepted connections.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.socket.no_delay = enabled;
        self
    }

    /// Cap the number of concurrent connections.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// Get the bind address string (address:port).
    pub fn bind_addr(&self) -> String {
        format_endpoint(&self.bind_address, self.port)
    }
}

/// Configuration for a TCP client.
#[derive(Clone, Debug, Default)]
pub struct TcpClientConfig {
    /// Socket-level options.
    pub socket: TcpSocketConfig,
}

impl TcpClientConfig {
    /// Create a new client configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set socket options.
    pub fn socket_config(mut self, config: TcpSocketConfig) -> Self {
        self.socket = config;
        self
    }

    /// Enable TCP_NODELAY.
    pub fn no_delay(mut self, enabled: bool) -> Self {
        self.socket.no_delay = enabled;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.socket.connect_timeout = timeout;
        self
    }
}
