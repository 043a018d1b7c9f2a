//! WebSocket transport adapter.
//!
//! Wraps a `tokio-tungstenite` connection behind the [`Transport`] trait.
//! The socket is split after the handshake: a writer task drains an outbound
//! channel into the sink, and a reader task turns inbound frames into
//! [`TransportEvent`]s. The reader emits `Closed` exactly once when the
//! stream ends, whichever side initiated the shutdown.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};

use crate::error::{ClientError, Result};
use crate::transport::{Transport, TransportEvent};

/// Buffered outbound frames awaiting the writer task.
const WRITER_CAPACITY: usize = 256;

/// Buffered transport events awaiting the consumer.
const EVENT_CAPACITY: usize = 256;

/// WebSocket-backed [`Transport`] implementation.
pub struct WebSocketTransport {
    /// Sender feeding the writer task; `None` while disconnected.
    writer_tx: RwLock<Option<mpsc::Sender<WsMessage>>>,
    /// Sender for transport events (cloned into the reader task).
    event_tx: mpsc::Sender<TransportEvent>,
    /// Receiver for transport events (returned by `events()`).
    event_rx: RwLock<Option<mpsc::Receiver<TransportEvent>>>,
    /// Reader and writer tasks of the active connection.
    tasks: RwLock<Vec<JoinHandle<()>>>,
}

impl WebSocketTransport {
    /// Creates a disconnected transport. The event channel lives for the
    /// whole transport lifetime, so one consumer survives reconnects.
    pub fn new() -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);

        Self {
            writer_tx: RwLock::new(None),
            event_tx,
            event_rx: RwLock::new(Some(event_rx)),
            tasks: RwLock::new(Vec::new()),
        }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for WebSocketTransport {
    /// Connects to `endpoint` and starts the reader and writer tasks.
    ///
    /// Reopening over a live connection cancels its tasks without a
    /// `Closed` event; call `close()` first for an orderly shutdown.
    fn open(
        &self,
        endpoint: &str,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>> {
        let endpoint = endpoint.to_string();
        Box::pin(async move {
            {
                let mut tasks = self.tasks.write().await;
                for task in tasks.drain(..) {
                    task.abort();
                }
            }

            let (ws_stream, _) = connect_async(endpoint.as_str()).await.map_err(|e| {
                ClientError::Transport(format!("websocket connection failed: {}", e))
            })?;
            info!(endpoint = %endpoint, "websocket connected");

            let (mut ws_sink, mut ws_stream) = ws_stream.split();
            let (writer_tx, mut writer_rx) = mpsc::channel::<WsMessage>(WRITER_CAPACITY);

            let writer = tokio::spawn(async move {
                while let Some(message) = writer_rx.recv().await {
                    if let Err(e) = ws_sink.send(message).await {
                        error!(error = %e, "failed to send websocket frame");
                        break;
                    }
                }
                debug!("websocket writer task ended");
            });

            let event_tx = self.event_tx.clone();
            let reader = tokio::spawn(async move {
                while let Some(result) = ws_stream.next().await {
                    match result {
                        Ok(WsMessage::Text(text)) => {
                            if event_tx.send(TransportEvent::Message(text)).await.is_err() {
                                break;
                            }
                        }
                        Ok(WsMessage::Close(_)) => {
                            debug!("websocket close frame received");
                            break;
                        }
                        Ok(WsMessage::Binary(payload)) => {
                            warn!(len = payload.len(), "dropping binary frame, protocol is text only");
                        }
                        Ok(_) => {
                            // Ping and pong are handled by tungstenite.
                        }
                        Err(e) => {
                            let _ = event_tx
                                .send(TransportEvent::Error(format!("websocket error: {}", e)))
                                .await;
                            break;
                        }
                    }
                }
                let _ = event_tx.send(TransportEvent::Closed).await;
                debug!("websocket reader task ended");
            });

            {
                let mut tasks = self.tasks.write().await;
                tasks.push(writer);
                tasks.push(reader);
            }
            *self.writer_tx.write().await = Some(writer_tx);

            if self.event_tx.send(TransportEvent::Opened).await.is_err() {
                warn!("transport event receiver dropped, Opened event lost");
            }
            Ok(())
        })
    }

    fn send(
        &self,
        frame: String,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let tx = { self.writer_tx.read().await.clone() };
            let Some(tx) = tx else {
                return Err(ClientError::ConnectionClosed);
            };
            tx.send(WsMessage::Text(frame))
                .await
                .map_err(|_| ClientError::ConnectionClosed)
        })
    }

    /// Starts the close handshake. The reader task emits `Closed` once the
    /// peer acknowledges or the stream ends. Closing while disconnected is
    /// a no-op.
    fn close(&self) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let tx = self.writer_tx.write().await.take();
            if let Some(tx) = tx {
                let _ = tx.send(WsMessage::Close(None)).await;
            }
            Ok(())
        })
    }

    /// Returns the transport event receiver.
    ///
    /// Returns None if the receiver has already been taken or if the lock
    /// is contended.
    fn events(&self) -> Option<mpsc::Receiver<TransportEvent>> {
        self.event_rx.try_write().ok()?.take()
    }
}
