//! Server-advertised command metadata, access levels, and the reserved
//! command names used by the handshake and channel operations.

use serde::{Deserialize, Serialize};

/// Least-privilege access level, assumed until the server grants another.
///
/// Levels are compared numerically with lower meaning more privileged, so a
/// freshly connected (or disconnected) client denies everything its command
/// catalog gates above zero.
pub const DEFAULT_ACCESS_LEVEL: u32 = 1000;

/// First handshake step: presents the public key/identifier.
pub const KEY_AUTH_COMMAND: &str = "apiKeyAuth";

/// Second handshake step: answers the cipher challenge.
pub const PRIVATE_AUTH_COMMAND: &str = "apiPrivateAuth";

/// Subscribes the connection to a broadcast channel.
pub const CHANNEL_JOIN_COMMAND: &str = "channelJoin";

/// Unsubscribes the connection from a broadcast channel.
pub const CHANNEL_LEAVE_COMMAND: &str = "channelLeave";

/// Fetches the server's command catalog.
pub const COMMANDS_LIST_COMMAND: &str = "commandsList";

/// One server-advertised command.
///
/// Returned (keyed by name) from the command catalog request and used only
/// for local pre-flight access checks; the server enforces its own limits
/// regardless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInfo {
    /// Command name as the server dispatches it.
    pub command: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Minimum access level required; absent means most-privileged only.
    #[serde(default)]
    pub level: u32,
}

impl CommandInfo {
    /// Whether a client holding `level` clears this command's requirement.
    pub fn allows(&self, level: u32) -> bool {
        level <= self.level
    }
}

/// Server reply payload for both handshake steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthAck {
    /// Whether the server requires (first step) or confirms (second step)
    /// cipher mode for this connection.
    #[serde(default)]
    pub cipher: bool,
    /// Challenge value to encrypt and return, present when `cipher` is set
    /// on the first step.
    #[serde(default)]
    pub verify: Option<String>,
    /// Access level granted to the connection.
    #[serde(default)]
    pub level: Option<u32>,
}
