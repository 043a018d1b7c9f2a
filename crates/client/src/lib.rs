//! # Rackline Client Library
//!
//! This crate provides the client-side transport for the Rackline rack
//! remote-command system: request/response commands and channel broadcasts
//! multiplexed over one persistent connection.
//!
//! ## Overview
//!
//! The client crate builds the session layer on top of the
//! [`protocol`] envelopes:
//!
//! - **Command dispatch**: correlation indices, per-command timeout, and
//!   exactly-once completion for concurrent in-flight commands
//! - **Authentication**: the two-step key/challenge handshake, including
//!   cipher-mode negotiation
//! - **Channels**: join/leave operations and per-channel broadcast routing
//! - **Lifecycle**: the connection state machine with automatic session
//!   reset on close
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          RemoteClient (facade)          │  commands, auth, channels
//! ├──────────────┬───────────────┬──────────┤
//! │  Dispatcher  │ ChannelRouter │  Cipher  │  correlation, broadcasts
//! ├──────────────┴───────────────┴──────────┤
//! │           Transport (trait)             │  WebSocket by default
//! └─────────────────────────────────────────┘
//! ```
//!
//! The transport is injected behind the [`Transport`] trait, so tests and
//! alternative carriers plug in without touching the session layer.
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use client::{ClientConfig, RemoteClient, WebSocketTransport};
//! use serde_json::json;
//!
//! # async fn run() -> client::Result<()> {
//! let config = ClientConfig::new()
//!     .with_endpoint("ws://rack.local:4044")
//!     .with_key("operator")
//!     .with_private_key("private key material");
//!
//! let client = Arc::new(RemoteClient::new(
//!     config,
//!     Arc::new(WebSocketTransport::new()),
//! )?);
//! client.clone().start();
//!
//! client.connect().await?;
//! let auth = client.authenticate().await?;
//! println!("authenticated at level {}", auth.level);
//!
//! let status = client.command("status", json!({"node": 3})).await?;
//! println!("node status: {status}");
//!
//! let mut news = client.join_channel("news").await?;
//! while let Some(frame) = news.recv().await {
//!     println!("broadcast: {:?}", frame.payload);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`client`]: the [`RemoteClient`] facade and connection lifecycle
//! - [`config`]: TOML-backed configuration with validation
//! - [`dispatch`]: correlation index dispatcher with timeouts
//! - [`router`]: per-channel broadcast routing
//! - [`transport`]: the transport contract and its event set
//! - [`websocket`]: the WebSocket transport implementation
//! - [`error`]: error types

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod router;
pub mod transport;
pub mod websocket;

pub use client::{AuthOutcome, ClientEvent, ConnectionState, RemoteClient};
pub use config::{ClientConfig, ConfigError};
pub use dispatch::CommandDispatcher;
pub use error::{ClientError, Result};
pub use router::ChannelRouter;
pub use transport::{Transport, TransportEvent};
pub use websocket::WebSocketTransport;
