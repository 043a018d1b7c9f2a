//! Transport contract between the client and a concrete connection.
//!
//! The protocol engine never touches sockets directly. A [`Transport`]
//! implementation owns the physical connection and surfaces its lifecycle
//! as [`TransportEvent`]s through a channel the client consumes; the client
//! drives it through `open`/`send`/`close`. Production code uses the
//! WebSocket implementation in [`crate::websocket`]; tests inject their own.

use tokio::sync::mpsc;

use crate::error::Result;

/// Signals surfaced by a transport to the connection lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection is established and ready to carry frames.
    Opened,
    /// The connection is gone; server-side session state is invalid.
    Closed,
    /// The transport hit an error; a close signal is expected to follow.
    Error(String),
    /// One inbound text frame, exactly as received.
    Message(String),
}

/// Connection-oriented text transport.
///
/// This trait abstracts the connection, allowing different implementations
/// (WebSocket in production, in-process mocks for testing). Methods return
/// boxed futures so the trait stays object-safe behind `Arc<dyn Transport>`.
pub trait Transport: Send + Sync {
    /// Opens a connection to `endpoint`.
    ///
    /// Resolves once the connection is established; an [`TransportEvent::Opened`]
    /// event is emitted as well so the lifecycle manager observes the
    /// transition regardless of who initiated it.
    fn open(
        &self,
        endpoint: &str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>>;

    /// Sends one text frame over the open connection.
    fn send(
        &self,
        frame: String,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>>;

    /// Closes the connection.
    ///
    /// A [`TransportEvent::Closed`] event follows once the connection is
    /// actually gone. Closing an already-closed transport is a no-op.
    fn close(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>>;

    /// Returns the receiver for transport events.
    /// Returns None if the receiver has already been taken or if the lock is contended.
    fn events(&self) -> Option<mpsc::Receiver<TransportEvent>>;
}
