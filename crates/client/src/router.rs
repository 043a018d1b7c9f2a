//! Broadcast channel routing.
//!
//! Server-initiated broadcast frames carry a `target` channel name instead of
//! a correlation index. The router keeps one subscription per channel and
//! hands each frame to the matching receiver. Frames for channels nobody
//! subscribed to are dropped, which is normal when a broadcast races a leave.

use dashmap::DashMap;
use protocol::BroadcastFrame;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Buffered frames per subscription. When the subscriber falls behind,
/// further frames are dropped rather than stalling the read loop.
const SUBSCRIPTION_CAPACITY: usize = 256;

/// Routes broadcast frames to per-channel subscriptions.
#[derive(Default)]
pub struct ChannelRouter {
    channels: DashMap<String, mpsc::Sender<BroadcastFrame>>,
}

impl ChannelRouter {
    /// Create a router with no subscriptions.
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Register a subscription for `channel` and return its receiver.
    ///
    /// A second registration for the same channel replaces the first; the
    /// old receiver stops yielding frames.
    pub fn register(&self, channel: &str) -> mpsc::Receiver<BroadcastFrame> {
        self.register_with_capacity(channel, SUBSCRIPTION_CAPACITY)
    }

    /// Register a subscription with a specific buffer capacity.
    pub fn register_with_capacity(
        &self,
        channel: &str,
        capacity: usize,
    ) -> mpsc::Receiver<BroadcastFrame> {
        let (tx, rx) = mpsc::channel(capacity);
        if self.channels.insert(channel.to_string(), tx).is_some() {
            debug!(channel, "replaced existing channel subscription");
        }
        rx
    }

    /// Remove the subscription for `channel`.
    ///
    /// Returns false when the channel had no subscription.
    pub fn unregister(&self, channel: &str) -> bool {
        self.channels.remove(channel).is_some()
    }

    /// Whether a subscription currently exists for `channel`.
    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    /// Deliver a broadcast frame to its target channel's subscription.
    ///
    /// Returns true when the frame reached a receiver. Subscriptions whose
    /// receiver has been dropped are pruned on the way.
    pub fn route(&self, frame: BroadcastFrame) -> bool {
        let Some(tx) = self.channels.get(&frame.target).map(|e| e.value().clone()) else {
            debug!(target = %frame.target, "broadcast for channel without subscription");
            return false;
        };

        match tx.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(frame)) => {
                warn!(
                    target = %frame.target,
                    capacity = SUBSCRIPTION_CAPACITY,
                    "subscription buffer full, dropping broadcast"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(frame)) => {
                debug!(target = %frame.target, "subscription receiver dropped, pruning channel");
                self.channels.remove(&frame.target);
                false
            }
        }
    }

    /// Drop every subscription. Receivers see end-of-stream.
    pub fn clear(&self) {
        self.channels.clear();
    }

    /// Names of all subscribed channels.
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|e| e.key().clone()).collect()
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no subscriptions exist.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl std::fmt::Debug for ChannelRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRouter")
            .field("channels", &self.channel_names())
            .finish()
    }
}
