//! Networking crate for Portside.
//!
//! This crate provides message-oriented TCP networking:
//!
//! - **TCP Server**: accept many clients, broadcast or address them individually
//! - **TCP Client**: connect to one server at a time
//! - **Inbox**: push (signal) and pull (await) delivery of inbound messages
//! - **Network Info**: enumerate interfaces and find the device IP address
//!
//! Messages are UTF-8 strings framed by a trailing newline. Outbound, a
//! newline is appended to each message; inbound, the byte stream is split on
//! `\n` and a trailing `\r` is stripped, so a peer sending CRLF lines works
//! too. TCP is a byte stream, so two quick sends may arrive in one read and
//! a large message across several; framing restores the message boundaries
//! either way.
//!
//! # Server
//!
//! ```ignore
//! use portside_net::{TcpServer, TcpServerConfig};
//!
//! let server = TcpServer::new(TcpServerConfig::new(4520).max_connections(10));
//! let addr = server.start().await?;
//! println!("listening on {addr}");
//!
//! server.inbox().message_received.connect(|message| {
//!     println!("{:?} sent {}", message.source, message.payload);
//! });
//!
//! server.broadcast("hello everyone");
//! server.stop().await;
//! ```
//!
//! # Client
//!
//! ```ignore
//! use portside_net::{TcpClient, TcpClientConfig};
//!
//! let client = TcpClient::new(TcpClientConfig::new());
//! client.connect("192.168.1.10", 4520).await?;
//! client.send("ping")?;
//!
//! let reply = client.inbox().recv().await;
//! println!("got {}", reply.payload);
//! client.disconnect().await;
//! ```
//!
//! # Device Address
//!
//! ```ignore
//! let ip = portside_net::device_ip_address()?;
//! println!("clients can reach this device at {ip}");
//! ```

mod error;
mod framing;
pub mod inbox;
pub mod netinfo;
pub mod tcp;

pub use error::{NetError, Result};

// Re-export commonly used types at the crate root
pub use inbox::{Inbox, InboundMessage};
pub use netinfo::device_ip_address;
pub use tcp::{
    ClientState, ConnectionId, ConnectionRegistry, ServerState, TcpClient, TcpClientConfig,
    TcpConnection, TcpServer, TcpServerConfig, TcpSocketConfig,
};
