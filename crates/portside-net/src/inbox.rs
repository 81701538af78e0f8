//! Inbound message queue with push and pull delivery.
//!
//! Every read loop (server-side connections and the client) delivers its
//! decoded messages to an [`Inbox`]. Listeners subscribe to
//! [`Inbox::message_received`] for push delivery; [`Inbox::recv`] offers a
//! pull-style await on the next message.
//!
//! # Delivery policy
//!
//! Push is authoritative: the read loop emits each message to all
//! listeners, in arrival order, before issuing its next read. Pull is a
//! convenience wrapper — a scoped subscription resolved by the next
//! emission — so push and pull coexist without double-delivery ambiguity.
//! Delivery is fire-and-forget from the caller's perspective; listeners
//! should not block, since they run inline in the read loop's task.

use std::time::{Duration, SystemTime};

use portside_core::Signal;
use tokio::sync::mpsc;

use crate::error::{NetError, Result};
use crate::tcp::ConnectionId;

/// A message received from a peer.
///
/// Transient by design: it is consumed by delivering it to listeners and
/// is not retained by the inbox.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// The server-side connection the message arrived on, or `None` when
    /// it was received by the client.
    pub source: Option<ConnectionId>,
    /// The decoded message payload.
    pub payload: String,
    /// Wall-clock arrival time.
    pub received_at: SystemTime,
}

/// Delivery point for inbound messages.
///
/// A server or client creates its own inbox by default; construct one
/// explicitly and pass it to both (`TcpServer::with_inbox`,
/// `TcpClient::with_inbox`) to merge their messages into a single stream.
pub struct Inbox {
    /// Signal emitted for every inbound message, in arrival order.
    pub message_received: Signal<InboundMessage>,
}

impl Inbox {
    /// Create an inbox with no listeners.
    pub fn new() -> Self {
        Self {
            message_received: Signal::new(),
        }
    }

    /// Deliver one message to all current listeners.
    ///
    /// Called by read loops; the loop does not read again until this
    /// returns, which bounds buffering to one in-flight message per
    /// connection.
    pub(crate) fn deliver(&self, source: Option<ConnectionId>, payload: String) {
        let message = InboundMessage {
            source,
            payload,
            received_at: SystemTime::now(),
        };
        tracing::trace!(
            target: "portside_net::inbox",
            source = ?message.source,
            len = message.payload.len(),
            "delivering inbound message"
        );
        self.message_received.emit(message);
    }

    /// Await the next message delivered to this inbox.
    ///
    /// Each concurrent caller receives a copy of the next message; push
    /// listeners are unaffected.
    pub async fn recv(&self) -> InboundMessage {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _guard = self
            .message_received
            .connect_scoped(move |message: &InboundMessage| {
                let _ = tx.send(message.clone());
            });

        match rx.recv().await {
            Some(message) => message,
            // The guard keeps the sender alive until this function returns,
            // so the channel cannot yield None while we are waiting.
            None => std::future::pending().await,
        }
    }

    /// Await the next message, failing with [`NetError::Timeout`] if none
    /// arrives within `timeout`.
    pub async fn recv_timeout(&self, timeout: Duration) -> Result<InboundMessage> {
        tokio::time::timeout(timeout, self.recv())
            .await
            .map_err(|_| NetError::Timeout)
    }
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;

    #[test]
    fn test_push_delivery_in_order() {
        let inbox = Inbox::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let received_clone = received.clone();
        inbox.message_received.connect(move |message| {
            received_clone.lock().push(message.payload.clone());
        });

        inbox.deliver(None, "one".to_string());
        inbox.deliver(None, "two".to_string());
        inbox.deliver(None, "three".to_string());

        assert_eq!(*received.lock(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_recv_resolves_on_next_delivery() {
        let inbox = Arc::new(Inbox::new());

        let inbox_clone = inbox.clone();
        let handle = tokio::spawn(async move { inbox_clone.recv().await });

        // Let the recv subscribe before delivering.
        tokio::time::sleep(Duration::from_millis(20)).await;
        inbox.deliver(None, "ping".to_string());

        let message = handle.await.expect("recv task panicked");
        assert_eq!(message.payload, "ping");
        assert!(message.source.is_none());
        // The scoped subscription is gone after recv returns.
        assert_eq!(inbox.message_received.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_recv_timeout_when_nothing_arrives() {
        let inbox = Inbox::new();
        let result = inbox.recv_timeout(Duration::from_millis(50)).await;
        assert_eq!(result.unwrap_err(), NetError::Timeout);
    }

    #[tokio::test]
    async fn test_push_and_pull_coexist() {
        let inbox = Arc::new(Inbox::new());
        let pushed = Arc::new(Mutex::new(Vec::new()));

        let pushed_clone = pushed.clone();
        inbox.message_received.connect(move |message| {
            pushed_clone.lock().push(message.payload.clone());
        });

        let inbox_clone = inbox.clone();
        let handle = tokio::spawn(async move { inbox_clone.recv().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        inbox.deliver(None, "shared".to_string());

        let pulled = handle.await.expect("recv task panicked");
        assert_eq!(pulled.payload, "shared");
        assert_eq!(*pushed.lock(), vec!["shared"]);
    }
}
