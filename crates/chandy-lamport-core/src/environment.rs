//! The seam between a server and whatever drives it.
//!
//! A server never touches clocks, loggers or other servers directly.
//! Everything it needs from outside goes through [`Environment`].

use crate::message::Message;
use crate::types::{ServerId, SnapshotId, Tick};

/// Services a driver provides to the servers it runs.
pub trait Environment {
    /// Tick at which a message sent now becomes deliverable.
    ///
    /// Drivers without simulated time may return 0.
    fn receive_time(&mut self) -> Tick;

    /// Called synchronously before a message is queued on a link, so the
    /// observed order matches the send order.
    fn message_sent(&mut self, from: &ServerId, to: &ServerId, message: &Message);

    /// Called exactly once per server per snapshot, when the marker has
    /// arrived on every inbound link.
    fn snapshot_complete(&mut self, server: &ServerId, snapshot_id: SnapshotId);
}

/// An environment that records every notification, for tests and for drivers
/// that inspect notifications after the fact.
#[derive(Debug, Default, Clone)]
pub struct RecordingEnvironment {
    /// Value returned by [`Environment::receive_time`].
    pub now: Tick,
    /// Sent messages, in send order.
    pub sent: Vec<(ServerId, ServerId, Message)>,
    /// Completion notifications, in order.
    pub completed: Vec<(ServerId, SnapshotId)>,
}

impl RecordingEnvironment {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Completions reported for `snapshot_id`.
    pub fn completions_for(&self, snapshot_id: SnapshotId) -> usize {
        self.completed
            .iter()
            .filter(|(_, id)| *id == snapshot_id)
            .count()
    }
}

impl Environment for RecordingEnvironment {
    fn receive_time(&mut self) -> Tick {
        self.now
    }

    fn message_sent(&mut self, from: &ServerId, to: &ServerId, message: &Message) {
        self.sent.push((from.clone(), to.clone(), *message));
    }

    fn snapshot_complete(&mut self, server: &ServerId, snapshot_id: SnapshotId) {
        self.completed.push((server.clone(), snapshot_id));
    }
}
