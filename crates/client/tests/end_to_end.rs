//! End-to-end integration tests for the Rackline client.
//!
//! These tests drive the full stack over real sockets against a scripted
//! in-process rack server:
//! - Connection establishment and teardown
//! - Authentication with and without cipher mode
//! - Command round-trips, server errors, and timeouts
//! - Channel join/leave and broadcast delivery

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

use client::{
    ClientConfig, ClientError, ClientEvent, ConnectionState, RemoteClient, WebSocketTransport,
};
use protocol::{EnvelopeCipher, DEFAULT_ACCESS_LEVEL};

/// Scripted rack server good enough for one client at a time.
///
/// Speaks the real wire protocol over real WebSockets: it answers the
/// reserved handshake commands, echoes, pushes one broadcast after each
/// channel join, and switches to encrypted envelopes after a successful
/// private-key verification, exactly as a production server would.
#[derive(Clone)]
struct RackServer {
    key: String,
    private_key: String,
    require_cipher: bool,
    challenge: String,
    level: u32,
}

impl RackServer {
    fn plain(key: &str, level: u32) -> Self {
        Self {
            key: key.to_string(),
            private_key: String::new(),
            require_cipher: false,
            challenge: String::new(),
            level,
        }
    }

    fn ciphered(key: &str, private_key: &str, challenge: &str, level: u32) -> Self {
        Self {
            key: key.to_string(),
            private_key: private_key.to_string(),
            require_cipher: true,
            challenge: challenge.to_string(),
            level,
        }
    }

    async fn spawn(self) -> (String, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let server = self.clone();
                tokio::spawn(async move { server.serve(stream).await });
            }
        });
        (format!("ws://{addr}"), handle)
    }

    async fn serve(self, stream: TcpStream) {
        let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        let (mut write, mut read) = ws.split();
        let cipher = EnvelopeCipher::new(&self.key, &self.private_key);
        let mut cipher_active = false;

        while let Some(Ok(message)) = read.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            let text = if cipher_active {
                cipher.decrypt(&text).unwrap()
            } else {
                text
            };
            let request: Value = serde_json::from_str(&text).unwrap();
            let command = request["command"].as_str().unwrap();
            let index = request["index"].as_u64().unwrap();
            let data = request["data"].clone();

            let mut activate_cipher = false;
            let reply = match command {
                "hangup" => break,
                "slowpoke" => continue,
                "apiKeyAuth" => {
                    assert_eq!(data["key"].as_str().unwrap(), self.key);
                    if self.require_cipher {
                        success(index, json!({"cipher": true, "verify": self.challenge}))
                    } else {
                        success(index, json!({"cipher": false, "level": self.level}))
                    }
                }
                "apiPrivateAuth" => {
                    if data["verify"].as_str() == Some(cipher.encrypt(&self.challenge).as_str()) {
                        activate_cipher = true;
                        success(index, json!({"cipher": true, "level": self.level}))
                    } else {
                        error(index, json!({"message": "verification failed"}))
                    }
                }
                "echo" => success(index, data.clone()),
                "commandsList" => success(
                    index,
                    json!({
                        "echo": {"command": "echo", "description": "echo parameters back", "level": 1000},
                        "reboot": {"command": "reboot", "description": "reboot the rack", "level": 1},
                    }),
                ),
                "channelJoin" => success(index, json!({})),
                "channelLeave" => success(index, json!({})),
                "restricted" => error(index, json!({"message": "access denied", "code": 403})),
                other => error(index, json!({"message": format!("unknown command {other}")})),
            };

            let frame = if cipher_active {
                cipher.encrypt(&reply)
            } else {
                reply
            };
            write.send(Message::Text(frame)).await.unwrap();
            if activate_cipher {
                cipher_active = true;
            }

            // A joined channel immediately greets its new subscriber.
            if command == "channelJoin" {
                let channel = data["channel"].as_str().unwrap();
                let broadcast =
                    json!({"command": "broadcast", "target": channel, "note": "welcome"})
                        .to_string();
                let frame = if cipher_active {
                    cipher.encrypt(&broadcast)
                } else {
                    broadcast
                };
                write.send(Message::Text(frame)).await.unwrap();
            }
        }
    }
}

fn success(index: u64, result_data: Value) -> String {
    json!({"index": index, "result": "success", "resultData": result_data}).to_string()
}

fn error(index: u64, result_data: Value) -> String {
    json!({"index": index, "result": "error", "resultData": result_data}).to_string()
}

async fn started_client(endpoint: &str, config: ClientConfig) -> Arc<RemoteClient> {
    let config = config.with_endpoint(endpoint);
    let client = Arc::new(
        RemoteClient::new(config, Arc::new(WebSocketTransport::new())).unwrap(),
    );
    client.clone().start();
    client
}

async fn wait_for(rx: &mut tokio::sync::broadcast::Receiver<ClientEvent>, wanted: ClientEvent) {
    timeout(Duration::from_secs(5), async {
        loop {
            if rx.recv().await.unwrap() == wanted {
                return;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {wanted:?}"));
}

// =============================================================================
// Session Establishment
// =============================================================================

#[tokio::test]
async fn test_connect_and_disconnect_lifecycle() {
    let (endpoint, _server) = RackServer::plain("operator", 5).spawn().await;
    let client = started_client(&endpoint, ClientConfig::new().with_key("operator")).await;
    let mut events = client.subscribe();

    client.connect().await.unwrap();
    wait_for(&mut events, ClientEvent::Connecting).await;
    wait_for(&mut events, ClientEvent::Open).await;
    assert!(client.is_connected().await);

    client.disconnect().await.unwrap();
    wait_for(&mut events, ClientEvent::Close).await;
    assert_eq!(client.state().await, ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_connect_to_unreachable_server_fails() {
    // Bind then drop so nothing is listening on the port.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = started_client(&endpoint, ClientConfig::new()).await;
    assert!(client.connect().await.is_err());
    assert_eq!(client.state().await, ConnectionState::Disconnected);
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_plain_authentication_adopts_level() {
    let (endpoint, _server) = RackServer::plain("operator", 5).spawn().await;
    let client = started_client(&endpoint, ClientConfig::new().with_key("operator")).await;

    client.connect().await.unwrap();
    let auth = client.authenticate().await.unwrap();
    assert_eq!(auth.level, 5);
    assert!(!auth.cipher_active);
    assert_eq!(client.level(), 5);
    assert!(!client.cipher_active());
}

#[tokio::test]
async fn test_cipher_authentication_and_encrypted_round_trip() {
    let (endpoint, _server) = RackServer::ciphered("rack-7", "super-secret", "c-123", 1)
        .spawn()
        .await;
    let client = started_client(
        &endpoint,
        ClientConfig::new()
            .with_key("rack-7")
            .with_private_key("super-secret"),
    )
    .await;

    client.connect().await.unwrap();
    let auth = client.authenticate().await.unwrap();
    assert_eq!(auth.level, 1);
    assert!(auth.cipher_active);
    assert!(client.cipher_active());

    // Commands keep working once every frame is ciphertext on the wire.
    let reply = client
        .command("echo", json!({"msg": "over ciphertext"}))
        .await
        .unwrap();
    assert_eq!(reply, json!({"msg": "over ciphertext"}));
}

#[tokio::test]
async fn test_wrong_private_key_fails_verification() {
    let (endpoint, _server) = RackServer::ciphered("rack-7", "super-secret", "c-123", 1)
        .spawn()
        .await;
    let client = started_client(
        &endpoint,
        ClientConfig::new()
            .with_key("rack-7")
            .with_private_key("not the right key"),
    )
    .await;

    client.connect().await.unwrap();
    match client.authenticate().await {
        Err(ClientError::Server(err)) => assert_eq!(err.message, "verification failed"),
        other => panic!("Expected verification failure, got {other:?}"),
    }
    assert!(!client.cipher_active());
    assert_eq!(client.level(), DEFAULT_ACCESS_LEVEL);
}

// =============================================================================
// Commands
// =============================================================================

#[tokio::test]
async fn test_echo_command_round_trip() {
    let (endpoint, _server) = RackServer::plain("operator", 5).spawn().await;
    let client = started_client(&endpoint, ClientConfig::new().with_key("operator")).await;

    client.connect().await.unwrap();
    let reply = client
        .command("echo", json!({"msg": "hello", "n": 42}))
        .await
        .unwrap();
    assert_eq!(reply, json!({"msg": "hello", "n": 42}));
    assert_eq!(client.in_flight(), 0);
}

#[tokio::test]
async fn test_server_error_reply_surfaces_details() {
    let (endpoint, _server) = RackServer::plain("operator", 5).spawn().await;
    let client = started_client(&endpoint, ClientConfig::new().with_key("operator")).await;

    client.connect().await.unwrap();
    match client.command("restricted", json!({})).await {
        Err(ClientError::Server(err)) => {
            assert_eq!(err.message, "access denied");
            assert_eq!(err.field("code"), Some(&json!(403)));
        }
        other => panic!("Expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_command_timeout_against_silent_server() {
    let (endpoint, _server) = RackServer::plain("operator", 5).spawn().await;
    let config = ClientConfig::new()
        .with_key("operator")
        .with_command_timeout(Duration::from_millis(100));
    let client = started_client(&endpoint, config).await;

    client.connect().await.unwrap();
    match client.command("slowpoke", json!({})).await {
        Err(ClientError::Timeout { timeout_ms }) => assert_eq!(timeout_ms, 100),
        other => panic!("Expected timeout, got {other:?}"),
    }
    assert_eq!(client.in_flight(), 0);
}

#[tokio::test]
async fn test_command_catalog_drives_access_checks() {
    let (endpoint, _server) = RackServer::plain("operator", 1).spawn().await;
    let client = started_client(&endpoint, ClientConfig::new().with_key("operator")).await;

    client.connect().await.unwrap();
    assert_eq!(client.refresh_command_list().await.unwrap(), 2);

    // At the default least-privilege level only the open command clears.
    assert!(client.check_access("echo").await);
    assert!(!client.check_access("reboot").await);
    assert!(!client.check_access("unknown").await);

    client.authenticate().await.unwrap();
    assert_eq!(client.level(), 1);
    assert!(client.check_access("reboot").await);
}

// =============================================================================
// Channels
// =============================================================================

#[tokio::test]
async fn test_channel_join_receives_broadcasts() {
    let (endpoint, _server) = RackServer::plain("operator", 5).spawn().await;
    let client = started_client(&endpoint, ClientConfig::new().with_key("operator")).await;

    client.connect().await.unwrap();
    let mut news = client.join_channel("news").await.unwrap();

    let frame = timeout(Duration::from_secs(5), news.recv())
        .await
        .expect("timed out waiting for broadcast")
        .expect("subscription ended early");
    assert_eq!(frame.target, "news");
    assert_eq!(frame.payload.get("note"), Some(&json!("welcome")));

    client.leave_channel("news").await.unwrap();
    assert!(news.recv().await.is_none());
}

#[tokio::test]
async fn test_reconnect_drops_channel_subscriptions() {
    let (endpoint, _server) = RackServer::plain("operator", 5).spawn().await;
    let client = started_client(&endpoint, ClientConfig::new().with_key("operator")).await;

    client.connect().await.unwrap();
    let mut news = client.join_channel("news").await.unwrap();

    client.disconnect().await.unwrap();
    // Drain the greeting if it raced the disconnect, then expect the end.
    while let Some(frame) = news.recv().await {
        assert_eq!(frame.target, "news");
    }

    client.connect().await.unwrap();
    assert!(client.is_connected().await);
    // A fresh join after reconnect works and greets again.
    let mut news = client.join_channel("news").await.unwrap();
    let frame = timeout(Duration::from_secs(5), news.recv())
        .await
        .expect("timed out waiting for broadcast")
        .expect("subscription ended early");
    assert_eq!(frame.payload.get("note"), Some(&json!("welcome")));
}

// =============================================================================
// Failure Handling
// =============================================================================

#[tokio::test]
async fn test_server_hangup_resets_session() {
    let (endpoint, _server) = RackServer::plain("operator", 5).spawn().await;
    let config = ClientConfig::new()
        .with_key("operator")
        .with_command_timeout(Duration::from_millis(300));
    let client = started_client(&endpoint, config).await;

    client.connect().await.unwrap();
    client.authenticate().await.unwrap();
    assert_eq!(client.level(), 5);

    let mut events = client.subscribe();
    let pending = {
        let client = client.clone();
        tokio::spawn(async move { client.command("hangup", json!({})).await })
    };

    wait_for(&mut events, ClientEvent::Close).await;
    assert_eq!(client.state().await, ConnectionState::Disconnected);
    assert_eq!(client.level(), DEFAULT_ACCESS_LEVEL);

    // The pending command is settled by its timer, not the close.
    match pending.await.unwrap() {
        Err(ClientError::Timeout { .. }) => {}
        other => panic!("Expected timeout, got {other:?}"),
    }

    // The same client can establish a fresh session afterwards.
    client.connect().await.unwrap();
    assert!(client.is_connected().await);
    let reply = client.command("echo", json!({"again": true})).await.unwrap();
    assert_eq!(reply, json!({"again": true}));
}
