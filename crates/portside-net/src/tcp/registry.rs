//! Server-side tracking of accepted connections.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::connection::{ConnectionId, TcpConnection};
use crate::error::{NetError, Result};

/// Tracks every accepted connection that is currently alive.
///
/// The accept loop inserts connections; each connection's I/O task triggers
/// removal when it observes EOF or an error. All mutation goes through the
/// internal mutex, so counts and broadcasts are consistent under concurrent
/// connect/disconnect.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<ConnectionId, Arc<TcpConnection>>>,
}

impl ConnectionRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, connection: Arc<TcpConnection>) {
        self.connections.lock().insert(connection.id(), connection);
    }

    pub(crate) fn remove(&self, id: ConnectionId) -> Option<Arc<TcpConnection>> {
        self.connections.lock().remove(&id)
    }

    /// Number of live connections.
    pub fn count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Ids of all live connections.
    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.lock().keys().copied().collect()
    }

    /// Look up a connection by id.
    pub fn get(&self, id: ConnectionId) -> Option<Arc<TcpConnection>> {
        self.connections.lock().get(&id).cloned()
    }

    /// Send a message to one connection.
    pub fn send_to(&self, id: ConnectionId, message: &str) -> Result<()> {
        match self.get(id) {
            Some(connection) => connection.send(message),
            None => Err(NetError::Io(format!("no such connection: {id}"))),
        }
    }

    /// Send a message to every live connection.
    ///
    /// A failed send on one connection is logged and skipped; the remaining
    /// connections still receive the message. Returns the number of
    /// connections the message was queued for.
    pub fn broadcast(&self, message: &str) -> usize {
        let connections: Vec<Arc<TcpConnection>> =
            self.connections.lock().values().cloned().collect();

        let mut delivered = 0;
        for connection in connections {
            match connection.send(message) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        target: "portside_net::tcp",
                        id = %connection.id(),
                        error = %e,
                        "broadcast send failed, skipping connection"
                    );
                }
            }
        }
        delivered
    }

    /// Close every tracked connection and clear the registry.
    ///
    /// Returns the number of connections that were closed.
    pub fn disconnect_all(&self) -> usize {
        let connections: Vec<Arc<TcpConnection>> =
            std::mem::take(&mut *self.connections.lock())
                .into_values()
                .collect();

        for connection in &connections {
            connection.close();
        }
        connections.len()
    }
}
