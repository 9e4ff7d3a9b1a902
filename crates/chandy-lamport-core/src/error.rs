//! Error types for the snapshot core.

use thiserror::Error;

use crate::types::{ServerId, SnapshotId};

/// A broken protocol invariant.
///
/// These indicate that the FIFO or single-origination assumptions were
/// violated, or that the caller asked for something impossible. The affected
/// server's bookkeeping can no longer be trusted, so drivers stop the run and
/// surface the error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// A second marker for the same snapshot arrived on the same link.
    #[error("server {server} received a duplicate marker for snapshot {snapshot_id} from {src}")]
    DuplicateMarker {
        server: ServerId,
        snapshot_id: SnapshotId,
        src: ServerId,
    },

    /// The snapshot was already originated or observed on this server.
    #[error("server {server} already started snapshot {snapshot_id}")]
    SnapshotAlreadyStarted {
        server: ServerId,
        snapshot_id: SnapshotId,
    },

    /// Transfer larger than the local balance.
    #[error("server {server} attempted to send {requested} tokens when it only has {available}")]
    InsufficientTokens {
        server: ServerId,
        requested: u64,
        available: u64,
    },

    /// Accepting a transfer would overflow the receiver's balance.
    #[error("server {server} holding {held} tokens cannot accept {amount} more from {src}")]
    TokenOverflow {
        server: ServerId,
        src: ServerId,
        held: u64,
        amount: u64,
    },

    /// Transfer to a server that is not an outbound neighbor.
    #[error("unknown destination {dest} from server {server}")]
    UnknownDestination { server: ServerId, dest: ServerId },

    /// A message arrived from a server that is not an inbound neighbor.
    #[error("server {server} received a message from unknown source {src}")]
    UnknownSource { server: ServerId, src: ServerId },

    /// Attempted to link a server to itself.
    #[error("server {0} cannot link to itself")]
    SelfLink(ServerId),

    /// Link already exists.
    #[error("link {src} -> {dest} already exists")]
    DuplicateLink { src: ServerId, dest: ServerId },
}

impl ProtocolViolation {
    /// The server whose bookkeeping detected the violation.
    pub fn server(&self) -> &ServerId {
        match self {
            Self::DuplicateMarker { server, .. }
            | Self::SnapshotAlreadyStarted { server, .. }
            | Self::InsufficientTokens { server, .. }
            | Self::TokenOverflow { server, .. }
            | Self::UnknownDestination { server, .. }
            | Self::UnknownSource { server, .. } => server,
            Self::SelfLink(server) => server,
            Self::DuplicateLink { src, .. } => src,
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, ProtocolViolation>;
