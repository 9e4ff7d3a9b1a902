//! Per-server snapshot records.
//!
//! A [`SnapshotRecord`] is one server's part of a global cut: the token count
//! it held when it first saw the marker, the inbound links whose marker has
//! since arrived, and the token messages that arrived on links still waiting
//! for their marker.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::message::{Message, SnapshotMessage};
use crate::types::ServerId;

/// One server's recorded state for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    tokens: u64,
    messages: Vec<SnapshotMessage>,
    markers_seen: BTreeSet<ServerId>,
}

impl SnapshotRecord {
    /// Open a record with the server's current token count.
    pub fn new(tokens: u64) -> Self {
        Self {
            tokens,
            messages: Vec::new(),
            markers_seen: BTreeSet::new(),
        }
    }

    /// Token count captured when the record was opened.
    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    /// Messages recorded as in flight, in arrival order.
    pub fn messages(&self) -> &[SnapshotMessage] {
        &self.messages
    }

    /// Inbound links whose marker has arrived.
    pub fn markers_seen(&self) -> &BTreeSet<ServerId> {
        &self.markers_seen
    }

    /// Whether the marker from `src` has arrived.
    pub fn has_marker_from(&self, src: &ServerId) -> bool {
        self.markers_seen.contains(src)
    }

    /// Tokens carried by the in-flight messages, saturating at `u64::MAX`.
    pub fn in_flight_tokens(&self) -> u64 {
        self.messages
            .iter()
            .fold(0u64, |total, m| total.saturating_add(m.message.tokens()))
    }

    /// Whether the marker has arrived on every link in `inbound`.
    ///
    /// Markers are only accepted from inbound neighbors, so comparing sizes
    /// is enough.
    pub fn is_closed(&self, inbound: &BTreeSet<ServerId>) -> bool {
        self.markers_seen.len() == inbound.len()
    }

    /// Mark the link from `src` as cut. Returns `false` if it already was.
    pub(crate) fn record_marker(&mut self, src: ServerId) -> bool {
        self.markers_seen.insert(src)
    }

    /// Record `message` as in flight on `src -> dest` if that link has not
    /// been cut yet. Returns whether it was recorded.
    pub(crate) fn record_in_flight(
        &mut self,
        src: &ServerId,
        dest: &ServerId,
        message: Message,
    ) -> bool {
        if self.has_marker_from(src) {
            return false;
        }
        self.messages.push(SnapshotMessage {
            src: src.clone(),
            dest: dest.clone(),
            message,
        });
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> BTreeSet<ServerId> {
        names.iter().map(|n| ServerId::new(*n)).collect()
    }

    #[test]
    fn test_new_record_is_open() {
        let record = SnapshotRecord::new(10);
        assert_eq!(record.tokens(), 10);
        assert!(record.messages().is_empty());
        assert!(!record.is_closed(&ids(&["A"])));
        assert!(record.is_closed(&ids(&[])));
    }

    #[test]
    fn test_marker_cuts_link() {
        let mut record = SnapshotRecord::new(0);
        let a = ServerId::new("A");
        let me = ServerId::new("B");

        assert!(record.record_in_flight(&a, &me, Message::token(3)));
        assert!(record.record_marker(a.clone()));
        assert!(!record.record_in_flight(&a, &me, Message::token(4)));
        assert!(!record.record_marker(a));

        assert_eq!(record.in_flight_tokens(), 3);
        assert!(record.is_closed(&ids(&["A"])));
    }
}
