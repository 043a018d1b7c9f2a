//! Command correlation and timeout tracking.
//!
//! Every outgoing command gets a correlation index from a monotonic counter;
//! the dispatcher keeps one pending entry per in-flight command and settles
//! it from whichever of the three completion paths wins: a matching reply, a
//! server error, or the armed timeout. Settlement is exactly-once because
//! all paths go through an atomic removal of the entry; late arrivals find
//! nothing and do nothing.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::debug;

use protocol::FIRST_COMMAND_INDEX;

use crate::error::ClientError;

/// Outcome delivered to a waiting caller: the reply's `resultData` on
/// success, or the command-level failure.
pub type CommandOutcome = Result<Value, ClientError>;

/// One in-flight command.
struct PendingCommand {
    /// Completes the waiting caller.
    reply_tx: oneshot::Sender<CommandOutcome>,
    /// Cancels the armed timeout; absent only in the narrow window before
    /// the timer task is registered.
    timer: Option<AbortHandle>,
}

/// Tracks in-flight commands and enforces the per-command timeout.
pub struct CommandDispatcher {
    counter: AtomicU64,
    pending: Arc<DashMap<u64, PendingCommand>>,
    timeout: Duration,
}

impl CommandDispatcher {
    /// Create a dispatcher enforcing `timeout` per command.
    pub fn new(timeout: Duration) -> Self {
        Self {
            counter: AtomicU64::new(FIRST_COMMAND_INDEX),
            pending: Arc::new(DashMap::new()),
            timeout,
        }
    }

    /// Register the next in-flight command.
    ///
    /// Assigns the correlation index, arms the timeout, and returns the
    /// receiver the caller awaits. The counter is 64-bit and never recycled,
    /// so indices are unique for the life of the process.
    pub fn begin(&self) -> (u64, oneshot::Receiver<CommandOutcome>) {
        let index = self.counter.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        self.pending.insert(
            index,
            PendingCommand {
                reply_tx,
                timer: None,
            },
        );

        let pending = Arc::clone(&self.pending);
        let timeout = self.timeout;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some((_, entry)) = pending.remove(&index) {
                let timeout_ms = timeout.as_millis() as u64;
                debug!(index, timeout_ms, "command timed out");
                let _ = entry.reply_tx.send(Err(ClientError::Timeout { timeout_ms }));
            }
        });
        // The entry may already be gone if the timer fired first; the
        // detached handle is then simply dropped.
        if let Some(mut entry) = self.pending.get_mut(&index) {
            entry.timer = Some(timer.abort_handle());
        }

        (index, reply_rx)
    }

    /// Settle the pending command for `index` with `outcome`.
    ///
    /// Returns false when no entry exists (the reply is late, duplicated, or
    /// for an index this client never issued); such replies are dropped by
    /// the caller as normal operation.
    pub fn settle(&self, index: u64, outcome: CommandOutcome) -> bool {
        let Some((_, entry)) = self.pending.remove(&index) else {
            return false;
        };
        if let Some(timer) = entry.timer {
            timer.abort();
        }
        // The caller may have dropped its receiver; the outcome is then
        // discarded, which is the documented abandonment behavior.
        let _ = entry.reply_tx.send(outcome);
        true
    }

    /// Drop the pending command for `index` without delivering an outcome.
    ///
    /// Used when the send attempt itself fails; the caller reports its own
    /// error and the entry must not linger until the timeout.
    pub fn abandon(&self, index: u64) {
        if let Some((_, entry)) = self.pending.remove(&index) {
            if let Some(timer) = entry.timer {
                timer.abort();
            }
        }
    }

    /// Number of commands currently awaiting a reply.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }
}

impl std::fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("in_flight", &self.pending.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}
