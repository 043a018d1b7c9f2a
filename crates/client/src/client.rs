//! Connection lifecycle and the client facade.
//!
//! `RemoteClient` ties the pieces together: it owns the connection state
//! machine, runs the inbound event loop over the injected transport, funnels
//! outbound envelopes through the cipher when active, and hosts the
//! authentication handshake and channel operations on top of the command
//! dispatcher.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use protocol::{
    AuthAck, BroadcastFrame, CommandInfo, CommandReply, CommandRequest, EnvelopeCipher,
    InboundFrame, ProtocolError, RemoteError, ReplyStatus, CHANNEL_JOIN_COMMAND,
    CHANNEL_LEAVE_COMMAND, COMMANDS_LIST_COMMAND, DEFAULT_ACCESS_LEVEL, KEY_AUTH_COMMAND,
    PRIVATE_AUTH_COMMAND,
};

use crate::config::ClientConfig;
use crate::dispatch::CommandDispatcher;
use crate::error::{ClientError, Result};
use crate::router::ChannelRouter;
use crate::transport::{Transport, TransportEvent};

/// Buffered lifecycle events per subscriber.
const EVENT_CAPACITY: usize = 64;

/// How long a local disconnect waits for the transport's close signal
/// before resetting the session itself.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Connection state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected. Initial state, and the state after any close.
    #[default]
    Disconnected,
    /// A connection attempt is in progress.
    Connecting,
    /// The connection is open and commands may be issued.
    Connected,
}

/// Lifecycle events emitted by the client.
///
/// Connection-level failures have no single caller, so they are broadcast
/// here instead of surfacing through a command future.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// A connection attempt started.
    Connecting,
    /// The connection is open.
    Open,
    /// The connection ended and session state was reset.
    Close,
    /// The transport reported a fault; a close usually follows.
    Error {
        /// Transport-supplied description.
        message: String,
    },
}

/// Result of a completed authentication handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthOutcome {
    /// Access level granted by the server.
    pub level: u32,
    /// Whether cipher mode was negotiated for this connection.
    pub cipher_active: bool,
}

/// Client for the rack remote-command protocol.
///
/// Construction takes a validated [`ClientConfig`] and any [`Transport`]
/// implementation. Wrap the client in an [`Arc`] and call [`start`] once to
/// launch the event loop before connecting:
///
/// ```no_run
/// use std::sync::Arc;
/// use client::{ClientConfig, RemoteClient, WebSocketTransport};
///
/// # async fn run() -> client::Result<()> {
/// let transport = Arc::new(WebSocketTransport::new());
/// let client = Arc::new(RemoteClient::new(ClientConfig::new(), transport)?);
/// client.clone().start();
/// client.connect().await?;
/// # Ok(())
/// # }
/// ```
///
/// All methods take `&self`; the client is shared freely across tasks.
///
/// [`start`]: RemoteClient::start
pub struct RemoteClient {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    dispatcher: CommandDispatcher,
    router: ChannelRouter,
    /// Connection state; writes also drive the derived-state resets.
    state: RwLock<ConnectionState>,
    /// Access level adopted from the server, least-privilege by default.
    level: AtomicU32,
    /// Whether envelopes are encrypted. Only the handshake sets this.
    cipher_active: AtomicBool,
    /// Public key/identifier, doubles as IV material.
    key: RwLock<String>,
    /// Private key, the cipher's key material.
    private_key: RwLock<String>,
    /// Server-advertised command catalog, replaced wholesale on refresh.
    commands: RwLock<HashMap<String, CommandInfo>>,
    event_tx: broadcast::Sender<ClientEvent>,
}

impl RemoteClient {
    /// Create a client over the given transport.
    ///
    /// Fails when the configuration does not validate.
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            dispatcher: CommandDispatcher::new(config.command_timeout()),
            router: ChannelRouter::new(),
            state: RwLock::new(ConnectionState::Disconnected),
            level: AtomicU32::new(DEFAULT_ACCESS_LEVEL),
            cipher_active: AtomicBool::new(false),
            key: RwLock::new(config.key.clone()),
            private_key: RwLock::new(config.private_key.clone()),
            commands: RwLock::new(HashMap::new()),
            event_tx,
            config,
            transport,
        })
    }

    /// Launch the event loop consuming the transport's events.
    ///
    /// Must be called exactly once, before [`connect`](RemoteClient::connect).
    pub fn start(self: Arc<Self>) {
        tokio::spawn(async move {
            self.run_event_loop().await;
        });
    }

    async fn run_event_loop(&self) {
        let Some(mut events) = self.transport.events() else {
            warn!("transport event receiver already taken, event loop not started");
            return;
        };
        debug!("client event loop started");

        while let Some(event) = events.recv().await {
            match event {
                TransportEvent::Opened => self.handle_open().await,
                TransportEvent::Message(text) => self.handle_message(text).await,
                TransportEvent::Error(message) => self.handle_error(message),
                TransportEvent::Closed => self.handle_close().await,
            }
        }
        debug!("transport event channel ended, event loop exiting");
    }

    // =========================================================================
    // Transport signal handlers
    // =========================================================================

    async fn handle_open(&self) {
        *self.state.write().await = ConnectionState::Connected;
        info!("connection open");
        self.emit(ClientEvent::Open);
    }

    /// Reset the session on close: cipher off, level back to least
    /// privilege, channel subscriptions gone. Pending commands are left to
    /// their timers. Idempotent, so a local disconnect followed by the
    /// transport's own close signal resets once.
    async fn handle_close(&self) {
        {
            let mut state = self.state.write().await;
            if *state == ConnectionState::Disconnected {
                return;
            }
            *state = ConnectionState::Disconnected;
        }
        self.cipher_active.store(false, Ordering::SeqCst);
        self.level.store(DEFAULT_ACCESS_LEVEL, Ordering::SeqCst);
        self.router.clear();
        info!("connection closed, session state reset");
        self.emit(ClientEvent::Close);
    }

    fn handle_error(&self, message: String) {
        warn!(message = %message, "transport error");
        self.emit(ClientEvent::Error { message });
    }

    async fn handle_message(&self, text: String) {
        let text = if self.cipher_active.load(Ordering::SeqCst) {
            match self.cipher().await.decrypt(&text) {
                Ok(plain) => plain,
                Err(e) => {
                    warn!(error = %e, "dropping frame that failed decryption");
                    return;
                }
            }
        } else {
            text
        };

        match InboundFrame::classify(&text) {
            Ok(Some(InboundFrame::Reply(reply))) => self.handle_reply(reply),
            Ok(Some(InboundFrame::Broadcast(frame))) => {
                self.router.route(frame);
            }
            Ok(None) => debug!("dropping frame that is neither reply nor broadcast"),
            Err(e) => warn!(error = %e, "dropping unparseable frame"),
        }
    }

    fn handle_reply(&self, reply: CommandReply) {
        let index = reply.index;
        let outcome = match reply.result {
            ReplyStatus::Success => Ok(reply.result_data),
            ReplyStatus::Error => Err(ClientError::Server(RemoteError::from_value(
                reply.result_data,
            ))),
        };
        if !self.dispatcher.settle(index, outcome) {
            debug!(index, "dropping reply with no pending command");
        }
    }

    // =========================================================================
    // Connection management
    // =========================================================================

    /// Connect to the configured endpoint.
    ///
    /// Tears down any live connection first. Resolves once the transport
    /// reports open, bounded by the configured connect timeout; on failure
    /// the state returns to `Disconnected`.
    pub async fn connect(&self) -> Result<()> {
        if *self.state.read().await != ConnectionState::Disconnected {
            self.disconnect().await?;
        }

        // Subscribe before opening so a fast open signal is not missed.
        let mut events = self.subscribe();
        *self.state.write().await = ConnectionState::Connecting;
        self.emit(ClientEvent::Connecting);
        info!(endpoint = %self.config.endpoint, "connecting");

        if let Err(e) = self.transport.open(&self.config.endpoint).await {
            *self.state.write().await = ConnectionState::Disconnected;
            error!(error = %e, "connection attempt failed");
            return Err(e);
        }

        let wait_open = async {
            loop {
                match events.recv().await {
                    Ok(ClientEvent::Open) => return Ok(()),
                    Ok(ClientEvent::Close) => return Err(ClientError::ConnectionClosed),
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(ClientError::ConnectionClosed)
                    }
                }
            }
        };

        match tokio::time::timeout(self.config.connect_timeout(), wait_open).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    timeout_ms = self.config.connect_timeout_ms,
                    "no open signal within the connect window"
                );
                let _ = self.transport.close().await;
                self.handle_close().await;
                Err(ClientError::Timeout {
                    timeout_ms: self.config.connect_timeout_ms,
                })
            }
        }
    }

    /// Close the connection and reset session state.
    ///
    /// Pending commands are left to their timers. Idempotent. Returns once
    /// the event loop has processed the transport's close signal, so the
    /// session is fully reset afterwards.
    pub async fn disconnect(&self) -> Result<()> {
        if *self.state.read().await == ConnectionState::Disconnected {
            return Ok(());
        }
        info!("disconnecting");
        let mut events = self.subscribe();
        self.transport.close().await?;

        let wait_close = async {
            loop {
                match events.recv().await {
                    Ok(ClientEvent::Close) => break,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };
        if tokio::time::timeout(CLOSE_GRACE, wait_close).await.is_err() {
            debug!("no close signal from the transport, resetting locally");
            self.handle_close().await;
        }
        Ok(())
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Issue a command and await its correlated reply.
    ///
    /// Returns the reply's `resultData` on success. Issuing while not
    /// connected fails with `ConnectionClosed` without touching the
    /// transport. One of success, server error, or timeout resolves every
    /// issued command exactly once.
    pub async fn command(&self, name: &str, params: Value) -> Result<Value> {
        if name.trim().is_empty() {
            return Err(ClientError::InvalidCommand(
                "command name must not be empty".to_string(),
            ));
        }
        if *self.state.read().await != ConnectionState::Connected {
            return Err(ClientError::ConnectionClosed);
        }

        let (index, reply_rx) = self.dispatcher.begin();
        let request = CommandRequest::new(name, index, params);
        let text = match request.to_json() {
            Ok(text) => text,
            Err(e) => {
                self.dispatcher.abandon(index);
                return Err(e.into());
            }
        };
        let frame = if self.cipher_active.load(Ordering::SeqCst) {
            self.cipher().await.encrypt(&text)
        } else {
            text
        };

        debug!(command = name, index, "sending command");
        if let Err(e) = self.transport.send(frame).await {
            self.dispatcher.abandon(index);
            return Err(e);
        }

        match reply_rx.await {
            Ok(outcome) => outcome,
            // The dispatcher dropped the sender without settling.
            Err(_) => Err(ClientError::ConnectionClosed),
        }
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Run the two-step authentication handshake.
    ///
    /// The first step presents the public key/identifier. Servers not
    /// requiring cipher mode grant a level immediately; otherwise the reply
    /// carries a challenge to encrypt with the private key and return. Only
    /// a successful second step switches cipher mode on, so both handshake
    /// commands travel in plaintext.
    pub async fn authenticate(&self) -> Result<AuthOutcome> {
        let key = self.key.read().await.clone();
        let reply = self.command(KEY_AUTH_COMMAND, json!({ "key": key })).await?;
        let ack: AuthAck = serde_json::from_value(reply).map_err(ProtocolError::from)?;

        if !ack.cipher {
            let level = ack.level.unwrap_or(DEFAULT_ACCESS_LEVEL);
            self.level.store(level, Ordering::SeqCst);
            info!(level, "authenticated, cipher not required");
            return Ok(AuthOutcome {
                level,
                cipher_active: false,
            });
        }

        let Some(challenge) = ack.verify else {
            return Err(ProtocolError::HandshakeFailed(
                "server requires cipher but sent no verify challenge".to_string(),
            )
            .into());
        };

        let ciphertext = self.cipher().await.encrypt(&challenge);
        let reply = self
            .command(PRIVATE_AUTH_COMMAND, json!({ "verify": ciphertext }))
            .await?;
        let ack: AuthAck = serde_json::from_value(reply).map_err(ProtocolError::from)?;

        let level = ack.level.unwrap_or(DEFAULT_ACCESS_LEVEL);
        self.level.store(level, Ordering::SeqCst);
        self.cipher_active.store(true, Ordering::SeqCst);
        info!(level, "authenticated, cipher active");
        Ok(AuthOutcome {
            level,
            cipher_active: true,
        })
    }

    // =========================================================================
    // Channels
    // =========================================================================

    /// Join a broadcast channel and return the receiver for its frames.
    ///
    /// The subscription is registered before the join confirmation so
    /// broadcasts racing the reply are not lost; it is rolled back when the
    /// join fails. Joining an already-joined channel replaces the previous
    /// receiver.
    pub async fn join_channel(&self, channel: &str) -> Result<mpsc::Receiver<BroadcastFrame>> {
        if channel.trim().is_empty() {
            return Err(ClientError::InvalidCommand(
                "channel name must not be empty".to_string(),
            ));
        }

        let rx = self.router.register(channel);
        match self
            .command(CHANNEL_JOIN_COMMAND, json!({ "channel": channel }))
            .await
        {
            Ok(_) => {
                info!(channel, "joined channel");
                Ok(rx)
            }
            Err(e) => {
                self.router.unregister(channel);
                debug!(channel, error = %e, "join failed, subscription rolled back");
                Err(e)
            }
        }
    }

    /// Leave a broadcast channel.
    ///
    /// The local subscription is removed only after the server confirms, so
    /// a failed leave keeps delivering.
    pub async fn leave_channel(&self, channel: &str) -> Result<Value> {
        let result = self
            .command(CHANNEL_LEAVE_COMMAND, json!({ "channel": channel }))
            .await?;
        self.router.unregister(channel);
        info!(channel, "left channel");
        Ok(result)
    }

    // =========================================================================
    // Command catalog
    // =========================================================================

    /// Fetch the server's command catalog, replacing the local copy
    /// wholesale. Returns the number of advertised commands.
    pub async fn refresh_command_list(&self) -> Result<usize> {
        let reply = self.command(COMMANDS_LIST_COMMAND, json!({})).await?;
        let catalog: HashMap<String, CommandInfo> =
            serde_json::from_value(reply).map_err(ProtocolError::from)?;
        let count = catalog.len();
        *self.commands.write().await = catalog;
        info!(count, "command catalog refreshed");
        Ok(count)
    }

    /// Pre-flight access check against the cached catalog.
    ///
    /// True iff the command is known and the adopted level clears its
    /// requirement. The server still enforces its own limits.
    pub async fn check_access(&self, name: &str) -> bool {
        let level = self.level.load(Ordering::SeqCst);
        self.commands
            .read()
            .await
            .get(name)
            .map(|info| info.allows(level))
            .unwrap_or(false)
    }

    /// Snapshot of the cached command catalog.
    pub async fn command_list(&self) -> HashMap<String, CommandInfo> {
        self.commands.read().await.clone()
    }

    // =========================================================================
    // Keys and accessors
    // =========================================================================

    /// Replace the public key/identifier used by future handshakes.
    pub async fn set_key(&self, key: impl Into<String>) {
        *self.key.write().await = key.into();
    }

    /// Replace the private key used by future handshakes.
    pub async fn set_private_key(&self, private_key: impl Into<String>) {
        *self.private_key.write().await = private_key.into();
    }

    /// Derive the cipher context from the current key pair.
    async fn cipher(&self) -> EnvelopeCipher {
        let key = self.key.read().await;
        let private_key = self.private_key.read().await;
        EnvelopeCipher::new(&key, &private_key)
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Whether the connection is open.
    pub async fn is_connected(&self) -> bool {
        self.state().await == ConnectionState::Connected
    }

    /// Access level adopted from the server.
    pub fn level(&self) -> u32 {
        self.level.load(Ordering::SeqCst)
    }

    /// Whether cipher mode is active.
    pub fn cipher_active(&self) -> bool {
        self.cipher_active.load(Ordering::SeqCst)
    }

    /// Number of commands awaiting a reply.
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: ClientEvent) {
        // A send error only means nobody is subscribed right now.
        let _ = self.event_tx.send(event);
    }
}
