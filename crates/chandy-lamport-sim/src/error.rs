//! Error types for the simulator.

use thiserror::Error;

use chandy_lamport_core::{ProtocolViolation, ServerId, SnapshotId};

/// Errors that can occur while building or running a simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// A server broke a protocol invariant. The run cannot continue.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// Referenced a server that is not part of the topology.
    #[error("unknown server: {0}")]
    UnknownServer(ServerId),

    /// Added the same server twice.
    #[error("server already exists: {0}")]
    DuplicateServer(ServerId),

    /// The tokens held across all servers do not fit in a `u64`.
    #[error("token total overflows at server {0}")]
    TokenOverflow(ServerId),

    /// Topology or event script could not be parsed.
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Not every server closed the snapshot within the tick budget.
    #[error("snapshot {snapshot_id} incomplete after {ticks} ticks, waiting on {pending:?}")]
    SnapshotIncomplete {
        snapshot_id: SnapshotId,
        ticks: u64,
        pending: Vec<ServerId>,
    },

    /// Events were still queued when the tick budget ran out.
    #[error("simulation still busy after {0} ticks")]
    Stalled(u64),

    /// Recorded state does not add up to the system total.
    #[error("snapshot {snapshot_id} records {actual} tokens, expected {expected}")]
    ConservationViolated {
        snapshot_id: SnapshotId,
        expected: u64,
        actual: u64,
    },

    /// I/O failure while exporting logs.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding failure.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

/// Result type for simulator operations.
pub type Result<T> = std::result::Result<T, SimError>;
