//! Mailbox and notification types.

use tokio::sync::oneshot;

use chandy_lamport_core::{Message, ProtocolViolation, ServerId, SnapshotId, SnapshotRecord};

/// Reply channel for coordinator requests.
pub type Reply<T> = oneshot::Sender<T>;

/// Everything an actor's mailbox can carry.
#[derive(Debug)]
pub enum Command {
    /// A message arriving on the link from `src`.
    Deliver { src: ServerId, message: Message },
    /// Originate a snapshot on this server.
    StartSnapshot {
        snapshot_id: SnapshotId,
        reply: Reply<Result<(), ProtocolViolation>>,
    },
    /// Transfer tokens to a neighbor.
    SendTokens {
        dest: ServerId,
        amount: u64,
        reply: Reply<Result<(), ProtocolViolation>>,
    },
    /// Read this server's record for a snapshot.
    GetSnapshot {
        snapshot_id: SnapshotId,
        reply: Reply<Option<SnapshotRecord>>,
    },
    /// Read this server's current token count.
    GetTokens { reply: Reply<u64> },
    /// Stop after handling everything queued before this command.
    Shutdown,
}

/// What actors report back to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// `server` closed its record for `snapshot_id`.
    SnapshotComplete {
        server: ServerId,
        snapshot_id: SnapshotId,
    },
    /// A server stopped on a protocol violation.
    Violation(ProtocolViolation),
}
