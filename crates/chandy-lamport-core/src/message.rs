//! Payloads carried on links.
//!
//! The message set is closed: a handler matches exhaustively on [`Message`],
//! so a new kind of message is a compile-time extension.

use serde::{Deserialize, Serialize};

use crate::types::{ServerId, SnapshotId, Tick};

/// A message travelling on a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Snapshot boundary for `snapshot_id`.
    Marker {
        /// Which snapshot this marker delimits.
        snapshot_id: SnapshotId,
    },
    /// Application message moving `amount` tokens from sender to receiver.
    Token {
        /// Number of tokens transferred.
        amount: u64,
    },
}

impl Message {
    /// Create a marker message.
    pub const fn marker(snapshot_id: SnapshotId) -> Self {
        Self::Marker { snapshot_id }
    }

    /// Create a token transfer message.
    pub const fn token(amount: u64) -> Self {
        Self::Token { amount }
    }

    /// Returns `true` if this is a marker.
    pub const fn is_marker(&self) -> bool {
        matches!(self, Self::Marker { .. })
    }

    /// Tokens carried by this message (0 for markers).
    pub const fn tokens(&self) -> u64 {
        match self {
            Self::Token { amount } => *amount,
            Self::Marker { .. } => 0,
        }
    }
}

/// A message recorded as in flight by a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMessage {
    /// Sender.
    pub src: ServerId,
    /// Receiver (the recording server).
    pub dest: ServerId,
    /// The recorded payload.
    pub message: Message,
}

/// An event queued on a link, waiting for the driver to deliver it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendMessageEvent {
    /// Sender.
    pub src: ServerId,
    /// Receiver.
    pub dest: ServerId,
    /// Payload.
    pub message: Message,
    /// Earliest tick at which the driver may deliver this event.
    pub receive_time: Tick,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_tokens() {
        assert_eq!(Message::token(5).tokens(), 5);
        assert_eq!(Message::marker(SnapshotId(1)).tokens(), 0);
        assert!(Message::marker(SnapshotId(1)).is_marker());
        assert!(!Message::token(0).is_marker());
    }

    #[test]
    fn test_message_json_is_tagged() {
        let json = serde_json::to_string(&Message::token(3)).unwrap();
        assert_eq!(json, r#"{"type":"token","amount":3}"#);

        let marker: Message = serde_json::from_str(r#"{"type":"marker","snapshot_id":2}"#).unwrap();
        assert_eq!(marker, Message::marker(SnapshotId(2)));
    }

    #[test]
    fn test_unknown_message_kind_rejected() {
        let result = serde_json::from_str::<Message>(r#"{"type":"ping"}"#);
        assert!(result.is_err());
    }
}
