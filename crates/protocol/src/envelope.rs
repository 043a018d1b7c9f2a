//! Wire envelope definitions for the rack remote-command protocol.
//!
//! This module defines the three envelope shapes exchanged over a connection:
//! outbound command requests, inbound correlated replies, and inbound
//! server-pushed broadcasts. All envelopes are JSON text frames; when cipher
//! mode is active the whole frame text is replaced by base64 ciphertext
//! before it reaches the transport (see [`crate::cipher`]).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// First correlation index a dispatcher hands out.
///
/// Inbound classification treats a zero or missing index as "not a reply",
/// so the counter must start well above zero and never wrap back into the
/// reserved range.
pub const FIRST_COMMAND_INDEX: u64 = 1000;

/// Command name carried by server-pushed broadcast envelopes.
pub const BROADCAST_COMMAND: &str = "broadcast";

/// Outbound command envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Command name understood by the server.
    pub command: String,
    /// Correlation index linking this request to its eventual reply.
    pub index: u64,
    /// Command parameters, forwarded verbatim.
    pub data: Value,
}

impl CommandRequest {
    /// Create a new request envelope.
    pub fn new(command: impl Into<String>, index: u64, data: Value) -> Self {
        Self {
            command: command.into(),
            index,
            data,
        }
    }

    /// Serialize the envelope to its JSON wire text.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Result discriminator in a correlated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    /// The command succeeded; `resultData` holds its result.
    Success,
    /// The command failed; `resultData` holds a structured error payload.
    Error,
}

/// Inbound correlated reply to a previously issued command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandReply {
    /// Correlation index of the originating request.
    pub index: u64,
    /// Whether the command succeeded or failed.
    pub result: ReplyStatus,
    /// Result payload (success data or error payload).
    #[serde(rename = "resultData", default)]
    pub result_data: Value,
}

/// Inbound server-pushed broadcast for a named channel.
///
/// Everything except `target` is preserved in `payload`, so subscribers see
/// the envelope exactly as the server sent it (including the `command`
/// discriminator field).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastFrame {
    /// Channel the broadcast is addressed to.
    pub target: String,
    /// Remaining envelope fields, verbatim.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// Structured error payload returned by the remote side.
///
/// Servers report failures as free-form JSON objects; every field is kept so
/// callers can inspect whatever the server attached (codes, offending
/// parameters, nested context). `message` is pulled out for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Human-readable error message, empty if the server sent none.
    #[serde(default)]
    pub message: String,
    /// All remaining fields of the error payload, verbatim.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl RemoteError {
    /// Build from a reply's `resultData`, preserving every field.
    ///
    /// Non-object payloads (a bare string, a number) become the message.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => {
                let message = map
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                let details = map.into_iter().filter(|(k, _)| k != "message").collect();
                Self { message, details }
            }
            Value::String(message) => Self {
                message,
                details: Map::new(),
            },
            Value::Null => Self {
                message: String::new(),
                details: Map::new(),
            },
            other => Self {
                message: other.to_string(),
                details: Map::new(),
            },
        }
    }

    /// Look up an extra field of the error payload by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.details.get(name)
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "unspecified server error")
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// An inbound envelope after classification.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Correlated reply to a previously issued command.
    Reply(CommandReply),
    /// Server-pushed broadcast for a named channel.
    Broadcast(BroadcastFrame),
}

impl InboundFrame {
    /// Classify one inbound text frame.
    ///
    /// A frame with a nonzero `index` is a correlated reply; a frame whose
    /// `command` is `"broadcast"` with a `target` channel is a broadcast.
    /// Returns `Ok(None)` for well-formed JSON matching neither shape; the
    /// caller drops such frames as normal operation. Malformed JSON or a
    /// reply violating the wire contract is an error.
    pub fn classify(text: &str) -> Result<Option<InboundFrame>> {
        let value: Value = serde_json::from_str(text)?;
        let index = value.get("index").and_then(Value::as_u64).unwrap_or(0);
        if index != 0 {
            let reply: CommandReply = serde_json::from_value(value)?;
            return Ok(Some(InboundFrame::Reply(reply)));
        }
        if value.get("command").and_then(Value::as_str) == Some(BROADCAST_COMMAND)
            && value.get("target").is_some()
        {
            let broadcast: BroadcastFrame = serde_json::from_value(value)?;
            return Ok(Some(InboundFrame::Broadcast(broadcast)));
        }
        Ok(None)
    }
}
