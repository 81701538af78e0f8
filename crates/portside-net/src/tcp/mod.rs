//! TCP client and server for line-framed message exchange.
//!
//! Messages are UTF-8 strings framed by a trailing newline; inbound bytes
//! are split on `\n` (a trailing `\r` is stripped) and delivered through an
//! [`Inbox`](crate::inbox::Inbox).
//!
//! - **TcpServer**: accept connections and exchange messages with many clients
//! - **TcpClient**: connect to one server at a time
//! - **TcpConnection**: a single accepted connection on the server side
//!
//! # Server Example
//!
//! ```ignore
//! use portside_net::tcp::{TcpServer, TcpServerConfig};
//!
//! let server = TcpServer::new(TcpServerConfig::new(4520));
//! let addr = server.start().await?;
//!
//! server.connection_opened().connect(|id| {
//!     println!("client {id} connected");
//! });
//! server.inbox().message_received.connect(|message| {
//!     println!("{:?}: {}", message.source, message.payload);
//! });
//!
//! server.broadcast("hello everyone");
//! ```
//!
//! # Client Example
//!
//! ```ignore
//! use portside_net::tcp::{TcpClient, TcpClientConfig};
//!
//! let client = TcpClient::new(TcpClientConfig::new());
//! client.connect("127.0.0.1", 4520).await?;
//! client.send("hello")?;
//!
//! let reply = client.inbox().recv().await;
//! println!("got: {}", reply.payload);
//! ```

mod client;
mod config;
mod connection;
mod registry;
mod server;
mod state;

pub use client::TcpClient;
pub use config::{TcpClientConfig, TcpServerConfig, TcpSocketConfig};
pub use connection::{ConnectionId, TcpConnection};
pub use registry::ConnectionRegistry;
pub use server::TcpServer;
pub use state::{ClientState, ServerState};
