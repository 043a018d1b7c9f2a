//! Error types for the client crate.

use protocol::{ProtocolError, RemoteError};
use thiserror::Error;

/// Client error type covering all failure modes of the remote-command
/// transport.
///
/// Command-level failures reach the issuing caller through the command's
/// future; connection-level failures are broadcast as lifecycle events
/// because they have no single caller. Nothing here is fatal to the process.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No correlated reply arrived within the configured window.
    #[error("command timed out after {timeout_ms} ms")]
    Timeout {
        /// The window that elapsed.
        timeout_ms: u64,
    },

    /// A command was attempted while the connection was not open, or the
    /// connection went away underneath an operation.
    #[error("socket is closed")]
    ConnectionClosed,

    /// The server answered the command with a structured error payload.
    ///
    /// Every field the server attached is preserved in [`RemoteError`].
    #[error("server error: {0}")]
    Server(RemoteError),

    /// The transport adapter reported a failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The command request was rejected before leaving the client.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// Wire-level failure: serialization, classification, or cipher.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The supplied configuration failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
