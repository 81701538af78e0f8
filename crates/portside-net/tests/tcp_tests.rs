//! Tests for TCP client and server functionality.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use portside_net::tcp::{
    ClientState, ConnectionId, ServerState, TcpClient, TcpClientConfig, TcpServer,
    TcpServerConfig, TcpSocketConfig,
};
use portside_net::{Inbox, NetError};

#[test]
fn test_socket_config_builder() {
    let config = TcpSocketConfig::new()
        .no_delay(true)
        .read_buffer_size(16384)
        .connect_timeout(Duration::from_secs(10));

    assert!(config.no_delay);
    assert_eq!(config.read_buffer_size, 16384);
    assert_eq!(config.connect_timeout, Duration::from_secs(10));
}

#[test]
fn test_server_config_builder() {
    let config = TcpServerConfig::new(9000)
        .bind_address("127.0.0.1")
        .no_delay(true)
        .max_connections(10);

    assert_eq!(config.bind_address, "127.0.0.1");
    assert_eq!(config.port, 9000);
    assert_eq!(config.bind_addr(), "127.0.0.1:9000");
    assert!(config.socket.no_delay);
    assert_eq!(config.max_connections, Some(10));

    // IPv6 literals get bracketed so the port separator stays unambiguous
    let v6 = TcpServerConfig::new(9000).bind_address("::1");
    assert_eq!(v6.bind_addr(), "[::1]:9000");
}

#[test]
fn test_client_config_builder() {
    let config = TcpClientConfig::new()
        .no_delay(true)
        .connect_timeout(Duration::from_secs(5));

    assert!(config.socket.no_delay);
    assert_eq!(config.socket.connect_timeout, Duration::from_secs(5));
}

#[test]
fn test_client_initial_state() {
    let client = TcpClient::new(TcpClientConfig::new());

    assert_eq!(client.state(), ClientState::Disconnected);
    assert!(!client.is_connected());
    assert!(client.remote_addr().is_none());
}

#[test]
fn test_server_initial_state() {
    let server = TcpServer::new(TcpServerConfig::new(0));

    assert_eq!(server.state(), ServerState::Stopped);
    assert!(!server.is_listening());
    assert!(server.local_addr().is_none());
    assert_eq!(server.client_count(), 0);
}

#[test]
fn test_send_before_connect_fails() {
    let client = TcpClient::new(TcpClientConfig::new());

    assert_eq!(client.send("test"), Err(NetError::NotConnected));
    assert_eq!(
        client.send_to("test", "127.0.0.1", 8080),
        Err(NetError::NotConnected)
    );
}

#[tokio::test]
async fn test_start_twice_fails() {
    let server = TcpServer::new(TcpServerConfig::new(0).bind_address("127.0.0.1"));

    server.start().await.unwrap();
    assert_eq!(server.start().await, Err(NetError::AlreadyRunning));

    server.stop().await;
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let server = TcpServer::new(TcpServerConfig::new(0).bind_address("127.0.0.1"));

    assert!(!server.stop().await);

    server.start().await.unwrap();
    assert!(server.stop().await);
    assert!(!server.stop().await);
    assert_eq!(server.state(), ServerState::Stopped);
}

#[tokio::test]
async fn test_stop_releases_port() {
    let server = TcpServer::new(TcpServerConfig::new(0).bind_address("127.0.0.1"));
    let addr = server.start().await.unwrap();
    assert!(server.stop().await);

    // The port must be rebindable as soon as stop returns
    let second = TcpServer::new(TcpServerConfig::new(addr.port()).bind_address("127.0.0.1"));
    let second_addr = second.start().await.unwrap();
    assert_eq!(second_addr.port(), addr.port());

    second.stop().await;
}

#[tokio::test]
async fn test_connect_refused() {
    // Bind a port then free it so nothing is listening there
    let server = TcpServer::new(TcpServerConfig::new(0).bind_address("127.0.0.1"));
    let addr = server.start().await.unwrap();
    server.stop().await;

    let client = TcpClient::new(TcpClientConfig::new());
    let result = client.connect("127.0.0.1", addr.port()).await;

    assert!(matches!(result, Err(NetError::ConnectionRefused(_))));
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn test_connect_twice_fails() {
    let server = TcpServer::new(TcpServerConfig::new(0).bind_address("127.0.0.1"));
    let addr = server.start().await.unwrap();

    let client = TcpClient::new(TcpClientConfig::new());
    client.connect("127.0.0.1", addr.port()).await.unwrap();

    assert_eq!(
        client.connect("127.0.0.1", addr.port()).await,
        Err(NetError::AlreadyConnected)
    );

    client.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_client_server_round_trip() {
    let server = TcpServer::new(TcpServerConfig::new(0).bind_address("127.0.0.1"));
    let addr = server.start().await.unwrap();
    assert!(server.is_listening());

    let server_received: Arc<parking_lot::Mutex<Vec<String>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let server_received_clone = server_received.clone();
    server.inbox().message_received.connect(move |message| {
        server_received_clone.lock().push(message.payload.clone());
    });

    let client = TcpClient::new(TcpClientConfig::new().no_delay(true));

    let client_received: Arc<parking_lot::Mutex<Vec<String>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let client_received_clone = client_received.clone();
    client.inbox().message_received.connect(move |message| {
        client_received_clone.lock().push(message.payload.clone());
    });

    client.connect("127.0.0.1", addr.port()).await.unwrap();
    assert!(client.is_connected());

    // Wait for the server to register the connection
    for _ in 0..100 {
        if server.client_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.client_count(), 1);

    client.send("hello server").unwrap();

    for _ in 0..100 {
        if !server_received.lock().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    {
        let received = server_received.lock();
        assert_eq!(received.as_slice(), ["hello server"]);
    }

    let delivered = server.broadcast("hello client");
    assert_eq!(delivered, 1);

    for _ in 0..100 {
        if !client_received.lock().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    {
        let received = client_received.lock();
        assert_eq!(received.as_slice(), ["hello client"]);
    }

    // Disconnect must eventually bring the count back down
    client.disconnect().await;
    for _ in 0..100 {
        if server.client_count() == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.client_count(), 0);

    server.stop().await;
}

#[tokio::test]
async fn test_message_sizes_and_order() {
    let server = TcpServer::new(TcpServerConfig::new(0).bind_address("127.0.0.1"));
    let addr = server.start().await.unwrap();

    let received: Arc<parking_lot::Mutex<Vec<String>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let received_clone = received.clone();
    server.inbox().message_received.connect(move |message| {
        received_clone.lock().push(message.payload.clone());
    });

    let client = TcpClient::new(TcpClientConfig::new().no_delay(true));
    client.connect("127.0.0.1", addr.port()).await.unwrap();

    // Empty, single byte, buffer-sized, and larger than one read
    let messages = vec![
        String::new(),
        "x".to_string(),
        "y".repeat(8192),
        "z".repeat(70_000),
    ];
    for message in &messages {
        client.send(message).unwrap();
    }

    for _ in 0..200 {
        if received.lock().len() == messages.len() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(*received.lock(), messages);

    client.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_broadcast_to_multiple_clients() {
    let server = TcpServer::new(TcpServerConfig::new(0).bind_address("127.0.0.1"));
    let addr = server.start().await.unwrap();

    let make_client = || async {
        let client = TcpClient::new(TcpClientConfig::new());
        let received: Arc<parking_lot::Mutex<Vec<String>>> =
            Arc::new(parking_lot::Mutex::new(Vec::new()));
        let received_clone = received.clone();
        client.inbox().message_received.connect(move |message| {
            received_clone.lock().push(message.payload.clone());
        });
        client.connect("127.0.0.1", addr.port()).await.unwrap();
        (client, received)
    };

    let (client_a, received_a) = make_client().await;
    let (client_b, received_b) = make_client().await;

    for _ in 0..100 {
        if server.client_count() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.client_count(), 2);

    assert_eq!(server.broadcast("round one"), 2);

    for _ in 0..100 {
        if !received_a.lock().is_empty() && !received_b.lock().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(received_a.lock().as_slice(), ["round one"]);
    assert_eq!(received_b.lock().as_slice(), ["round one"]);

    // After one client leaves, the other still receives broadcasts
    client_a.disconnect().await;
    for _ in 0..100 {
        if server.client_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(server.broadcast("round two"), 1);
    for _ in 0..100 {
        if received_b.lock().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(received_b.lock().as_slice(), ["round one", "round two"]);
    assert_eq!(received_a.lock().as_slice(), ["round one"]);

    client_b.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_broadcast_survives_closed_connection() {
    let server = TcpServer::new(TcpServerConfig::new(0).bind_address("127.0.0.1"));
    let addr = server.start().await.unwrap();

    let opened: Arc<parking_lot::Mutex<Vec<ConnectionId>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let opened_clone = opened.clone();
    server.connection_opened().connect(move |id| {
        opened_clone.lock().push(*id);
    });

    let client_a = TcpClient::new(TcpClientConfig::new());
    let received_a: Arc<parking_lot::Mutex<Vec<String>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let received_a_clone = received_a.clone();
    client_a.inbox().message_received.connect(move |message| {
        received_a_clone.lock().push(message.payload.clone());
    });
    client_a.connect("127.0.0.1", addr.port()).await.unwrap();

    for _ in 0..100 {
        if opened.lock().len() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let id_a = opened.lock()[0];

    let client_b = TcpClient::new(TcpClientConfig::new());
    let received_b: Arc<parking_lot::Mutex<Vec<String>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let received_b_clone = received_b.clone();
    client_b.inbox().message_received.connect(move |message| {
        received_b_clone.lock().push(message.payload.clone());
    });
    client_b.connect("127.0.0.1", addr.port()).await.unwrap();

    for _ in 0..100 {
        if server.client_count() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Close A's connection server-side without yielding, so its registry
    // entry is still present when the broadcast runs. The dead entry must
    // be skipped and B must still receive the payload.
    server.registry().get(id_a).unwrap().close();
    let delivered = server.broadcast("still here");
    assert_eq!(delivered, 1);

    for _ in 0..100 {
        if !received_b.lock().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(received_b.lock().as_slice(), ["still here"]);
    assert!(received_a.lock().is_empty());

    // The closed connection is eventually reaped
    for _ in 0..100 {
        if server.client_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.client_count(), 1);

    client_b.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_ipv6_loopback_round_trip() {
    let server = TcpServer::new(TcpServerConfig::new(0).bind_address("::1"));
    // Hosts without an IPv6 loopback cannot run this scenario
    let Ok(addr) = server.start().await else {
        return;
    };

    let received: Arc<parking_lot::Mutex<Vec<String>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let received_clone = received.clone();
    server.inbox().message_received.connect(move |message| {
        received_clone.lock().push(message.payload.clone());
    });

    let client = TcpClient::new(TcpClientConfig::new());
    client.connect("::1", addr.port()).await.unwrap();

    client.send("over v6").unwrap();
    for _ in 0..100 {
        if !received.lock().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(received.lock().as_slice(), ["over v6"]);

    client.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_send_to_specific_connection() {
    let server = TcpServer::new(TcpServerConfig::new(0).bind_address("127.0.0.1"));
    let addr = server.start().await.unwrap();

    let opened: Arc<parking_lot::Mutex<Vec<ConnectionId>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let opened_clone = opened.clone();
    server.connection_opened().connect(move |id| {
        opened_clone.lock().push(*id);
    });

    let client_a = TcpClient::new(TcpClientConfig::new());
    let received_a: Arc<parking_lot::Mutex<Vec<String>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let received_a_clone = received_a.clone();
    client_a.inbox().message_received.connect(move |message| {
        received_a_clone.lock().push(message.payload.clone());
    });
    client_a.connect("127.0.0.1", addr.port()).await.unwrap();

    for _ in 0..100 {
        if opened.lock().len() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let id_a = opened.lock()[0];

    let client_b = TcpClient::new(TcpClientConfig::new());
    let received_b: Arc<parking_lot::Mutex<Vec<String>>> =
        Arc::new(parking_lot::Mutex::new(Vec::new()));
    let received_b_clone = received_b.clone();
    client_b.inbox().message_received.connect(move |message| {
        received_b_clone.lock().push(message.payload.clone());
    });
    client_b.connect("127.0.0.1", addr.port()).await.unwrap();

    for _ in 0..100 {
        if server.client_count() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    server.send_to(id_a, "only for a").unwrap();

    for _ in 0..100 {
        if !received_a.lock().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(received_a.lock().as_slice(), ["only for a"]);
    assert!(received_b.lock().is_empty());

    client_a.disconnect().await;
    client_b.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_connection_closed_signal() {
    let server = TcpServer::new(TcpServerConfig::new(0).bind_address("127.0.0.1"));
    let addr = server.start().await.unwrap();

    let closed_count = Arc::new(AtomicUsize::new(0));
    let closed_count_clone = closed_count.clone();
    server.connection_closed().connect(move |_id| {
        closed_count_clone.fetch_add(1, Ordering::SeqCst);
    });

    let client = TcpClient::new(TcpClientConfig::new());
    client.connect("127.0.0.1", addr.port()).await.unwrap();

    for _ in 0..100 {
        if server.client_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    client.disconnect().await;

    for _ in 0..100 {
        if closed_count.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(closed_count.load(Ordering::SeqCst), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_client_disconnected_signal_on_server_stop() {
    let server = TcpServer::new(TcpServerConfig::new(0).bind_address("127.0.0.1"));
    let addr = server.start().await.unwrap();

    let client = TcpClient::new(TcpClientConfig::new());
    let saw_disconnect = Arc::new(AtomicBool::new(false));
    let saw_disconnect_clone = saw_disconnect.clone();
    client.disconnected().connect(move |()| {
        saw_disconnect_clone.store(true, Ordering::SeqCst);
    });

    client.connect("127.0.0.1", addr.port()).await.unwrap();
    for _ in 0..100 {
        if server.client_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    server.stop().await;

    for _ in 0..100 {
        if saw_disconnect.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(saw_disconnect.load(Ordering::SeqCst));
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn test_inbox_pull_delivery() {
    let server = TcpServer::new(TcpServerConfig::new(0).bind_address("127.0.0.1"));
    let addr = server.start().await.unwrap();

    let client = TcpClient::new(TcpClientConfig::new().no_delay(true));
    client.connect("127.0.0.1", addr.port()).await.unwrap();

    for _ in 0..100 {
        if server.client_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    client.send("pulled").unwrap();

    let message = server
        .inbox()
        .recv_timeout(Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(message.payload, "pulled");
    assert!(message.source.is_some());

    // Nothing else pending
    let empty = server.inbox().recv_timeout(Duration::from_millis(50)).await;
    assert_eq!(empty.unwrap_err(), NetError::Timeout);

    client.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_shared_inbox_merges_sources() {
    let inbox = Arc::new(Inbox::new());

    let server =
        TcpServer::with_inbox(TcpServerConfig::new(0).bind_address("127.0.0.1"), inbox.clone());
    let addr = server.start().await.unwrap();

    let client = TcpClient::new(TcpClientConfig::new());
    client.connect("127.0.0.1", addr.port()).await.unwrap();
    for _ in 0..100 {
        if server.client_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    client.send("via shared inbox").unwrap();

    let message = inbox.recv_timeout(Duration::from_secs(5)).await.unwrap();
    assert_eq!(message.payload, "via shared inbox");

    client.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_listener_unsubscribe_isolation() {
    let server = TcpServer::new(TcpServerConfig::new(0).bind_address("127.0.0.1"));
    let addr = server.start().await.unwrap();

    let first = Arc::new(AtomicUsize::new(0));
    let first_clone = first.clone();
    let first_id = server.inbox().message_received.connect(move |_message| {
        first_clone.fetch_add(1, Ordering::SeqCst);
    });

    let second = Arc::new(AtomicUsize::new(0));
    let second_clone = second.clone();
    server.inbox().message_received.connect(move |_message| {
        second_clone.fetch_add(1, Ordering::SeqCst);
    });

    let client = TcpClient::new(TcpClientConfig::new().no_delay(true));
    client.connect("127.0.0.1", addr.port()).await.unwrap();

    client.send("one").unwrap();
    for _ in 0..100 {
        if second.load(Ordering::SeqCst) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(first.load(Ordering::SeqCst), 1);

    // Removing one listener must not affect the other
    assert!(server.inbox().message_received.disconnect(first_id));

    client.send("two").unwrap();
    for _ in 0..100 {
        if second.load(Ordering::SeqCst) == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(second.load(Ordering::SeqCst), 2);
    assert_eq!(first.load(Ordering::SeqCst), 1);

    client.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_max_connections_cap() {
    let server = TcpServer::new(
        TcpServerConfig::new(0)
            .bind_address("127.0.0.1")
            .max_connections(1),
    );
    let addr = server.start().await.unwrap();

    let client_a = TcpClient::new(TcpClientConfig::new());
    client_a.connect("127.0.0.1", addr.port()).await.unwrap();
    for _ in 0..100 {
        if server.client_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // The surplus client connects at the TCP level but is closed immediately
    let client_b = TcpClient::new(TcpClientConfig::new());
    if client_b.connect("127.0.0.1", addr.port()).await.is_ok() {
        for _ in 0..100 {
            if !client_b.is_connected() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!client_b.is_connected());
    }
    assert_eq!(server.client_count(), 1);

    // The first client is unaffected
    assert!(client_a.is_connected());

    client_a.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_send_to_wrong_endpoint_fails() {
    let server = TcpServer::new(TcpServerConfig::new(0).bind_address("127.0.0.1"));
    let addr = server.start().await.unwrap();

    let client = TcpClient::new(TcpClientConfig::new());
    client.connect("127.0.0.1", addr.port()).await.unwrap();

    assert_eq!(
        client.send_to("misdirected", "127.0.0.1", addr.port() ^ 1),
        Err(NetError::NotConnected)
    );
    assert_eq!(
        client.send_to("misdirected", "10.0.0.1", addr.port()),
        Err(NetError::NotConnected)
    );
    assert!(client.send_to("on target", "127.0.0.1", addr.port()).is_ok());

    client.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_connect_timeout_is_bounded() {
    // Non-routable address; the attempt should end in a bounded failure
    let client = TcpClient::new(
        TcpClientConfig::new().connect_timeout(Duration::from_secs(1)),
    );

    let start = Instant::now();
    let result = client.connect("10.255.255.1", 9).await;

    assert!(result.is_err());
    assert!(start.elapsed() < Duration::from_secs(5));
    assert_eq!(client.state(), ClientState::Disconnected);
}

#[tokio::test]
async fn test_client_disconnect_is_idempotent() {
    let server = TcpServer::new(TcpServerConfig::new(0).bind_address("127.0.0.1"));
    let addr = server.start().await.unwrap();

    let client = TcpClient::new(TcpClientConfig::new());
    assert!(!client.disconnect().await);

    client.connect("127.0.0.1", addr.port()).await.unwrap();
    assert!(client.disconnect().await);
    assert!(!client.disconnect().await);
    assert_eq!(client.state(), ClientState::Disconnected);

    // Can reconnect after a disconnect
    client.connect("127.0.0.1", addr.port()).await.unwrap();
    assert!(client.is_connected());

    client.disconnect().await;
    server.stop().await;
}
