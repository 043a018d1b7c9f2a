//! # Rackline Protocol Library
//!
//! This crate provides the wire protocol definitions for the Rackline rack
//! remote-command system.
//!
//! ## Overview
//!
//! The protocol crate is the foundation of Rackline's communication layer,
//! providing:
//!
//! - **Envelopes**: command requests, correlated replies, and channel
//!   broadcasts, all as JSON text frames
//! - **Envelope Cipher**: AES-256-CBC encryption of whole envelope texts,
//!   negotiated by a two-step challenge/response handshake
//! - **Command Metadata**: the server-advertised command catalog and access
//!   levels used for local pre-flight checks
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           Command Envelopes             │  JSON text
//! ├─────────────────────────────────────────┤
//! │          Envelope Cipher (opt-in)       │  AES-256-CBC, base64
//! ├─────────────────────────────────────────┤
//! │         Transport (WebSocket)           │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{CommandRequest, EnvelopeCipher, InboundFrame, FIRST_COMMAND_INDEX};
//! use serde_json::json;
//!
//! // Build a request envelope
//! let request = CommandRequest::new("echo", FIRST_COMMAND_INDEX, json!({"msg": "hi"}));
//! let text = request.to_json().unwrap();
//!
//! // Encrypt it for a cipher-active connection
//! let cipher = EnvelopeCipher::new("rack-7", "private key material");
//! let frame = cipher.encrypt(&text);
//! assert_eq!(cipher.decrypt(&frame).unwrap(), text);
//!
//! // Classify a reply from the server
//! let reply = r#"{"index":1000,"result":"success","resultData":{"msg":"hi"}}"#;
//! assert!(matches!(
//!     InboundFrame::classify(reply).unwrap(),
//!     Some(InboundFrame::Reply(_))
//! ));
//! ```
//!
//! ## Modules
//!
//! - [`envelope`]: wire envelope definitions and inbound classification
//! - [`cipher`]: envelope encryption for cipher-mode connections
//! - [`commands`]: command catalog metadata and reserved command names
//! - [`error`]: error types

pub mod cipher;
pub mod commands;
pub mod envelope;
pub mod error;

pub use cipher::EnvelopeCipher;
pub use commands::{
    AuthAck, CommandInfo, CHANNEL_JOIN_COMMAND, CHANNEL_LEAVE_COMMAND, COMMANDS_LIST_COMMAND,
    DEFAULT_ACCESS_LEVEL, KEY_AUTH_COMMAND, PRIVATE_AUTH_COMMAND,
};
pub use envelope::{
    BroadcastFrame, CommandReply, CommandRequest, InboundFrame, RemoteError, ReplyStatus,
    BROADCAST_COMMAND, FIRST_COMMAND_INDEX,
};
pub use error::{ProtocolError, Result};
