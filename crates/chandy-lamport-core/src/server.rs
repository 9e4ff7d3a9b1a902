//! The server state machine.
//!
//! A [`Server`] owns its token count, its outbound links and its registry of
//! snapshot records. Drivers hand it one event at a time through
//! [`Server::handle_message`]; because every mutation goes through `&mut self`,
//! a server is a single-owner state machine and needs no internal locking.
//! Drivers that run servers concurrently give each server its own task.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use crate::environment::Environment;
use crate::error::{ProtocolViolation, Result};
use crate::link::Link;
use crate::message::{Message, SendMessageEvent};
use crate::snapshot::SnapshotRecord;
use crate::types::{ServerId, SnapshotId};

/// A participant in the snapshot protocol.
#[derive(Debug, Clone)]
pub struct Server {
    id: ServerId,
    tokens: u64,
    /// Keyed by destination.
    outbound_links: BTreeMap<ServerId, Link>,
    /// Sources of inbound links. Only used to count expected markers.
    inbound_links: BTreeSet<ServerId>,
    snapshots: BTreeMap<SnapshotId, SnapshotRecord>,
}

impl Server {
    /// Create a server with no links.
    pub fn new(id: impl Into<ServerId>, tokens: u64) -> Self {
        Self {
            id: id.into(),
            tokens,
            outbound_links: BTreeMap::new(),
            inbound_links: BTreeSet::new(),
            snapshots: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &ServerId {
        &self.id
    }

    /// Current token count.
    pub fn tokens(&self) -> u64 {
        self.tokens
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Topology
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a link from this server to `dest`.
    ///
    /// The receiving server must register the matching inbound link; prefer
    /// [`connect`], which does both.
    pub fn add_outbound_link(&mut self, dest: ServerId) -> Result<()> {
        if dest == self.id {
            return Err(ProtocolViolation::SelfLink(dest));
        }
        match self.outbound_links.entry(dest) {
            Entry::Occupied(e) => Err(ProtocolViolation::DuplicateLink {
                src: self.id.clone(),
                dest: e.key().clone(),
            }),
            Entry::Vacant(e) => {
                let link = Link::new(self.id.clone(), e.key().clone());
                e.insert(link);
                Ok(())
            }
        }
    }

    /// Register a link from `src` into this server.
    pub fn add_inbound_link(&mut self, src: ServerId) -> Result<()> {
        if src == self.id {
            return Err(ProtocolViolation::SelfLink(src));
        }
        if self.inbound_links.contains(&src) {
            return Err(ProtocolViolation::DuplicateLink {
                src,
                dest: self.id.clone(),
            });
        }
        self.inbound_links.insert(src);
        Ok(())
    }

    /// Destinations of outbound links, in sorted order.
    pub fn outbound_neighbors(&self) -> impl Iterator<Item = &ServerId> {
        self.outbound_links.keys()
    }

    /// Sources of inbound links.
    pub fn inbound_neighbors(&self) -> &BTreeSet<ServerId> {
        &self.inbound_links
    }

    /// Outbound link to `dest`, if any.
    pub fn outbound_link(&self, dest: &ServerId) -> Option<&Link> {
        self.outbound_links.get(dest)
    }

    /// Outbound links in sorted destination order, for the driver to drain.
    pub fn outbound_links_mut(&mut self) -> impl Iterator<Item = &mut Link> {
        self.outbound_links.values_mut()
    }

    /// Number of events waiting on outbound links.
    pub fn pending_events(&self) -> usize {
        self.outbound_links.values().map(Link::len).sum()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Outbound operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Queue `message` on every outbound link, in neighbor order.
    pub fn send_to_neighbors<E: Environment + ?Sized>(&mut self, message: Message, env: &mut E) {
        broadcast(&self.id, &mut self.outbound_links, message, env);
    }

    /// Send `amount` tokens to the neighbor `dest`.
    ///
    /// The local balance drops before the message is queued.
    pub fn send_tokens<E: Environment + ?Sized>(
        &mut self,
        amount: u64,
        dest: &ServerId,
        env: &mut E,
    ) -> Result<()> {
        if amount > self.tokens {
            return Err(ProtocolViolation::InsufficientTokens {
                server: self.id.clone(),
                requested: amount,
                available: self.tokens,
            });
        }
        let link = self.outbound_links.get_mut(dest).ok_or_else(|| {
            ProtocolViolation::UnknownDestination {
                server: self.id.clone(),
                dest: dest.clone(),
            }
        })?;

        self.tokens -= amount;

        let message = Message::token(amount);
        env.message_sent(&self.id, dest, &message);
        tracing::debug!(server = %self.id, dest = %dest, amount, "sending tokens");
        link.push(SendMessageEvent {
            src: self.id.clone(),
            dest: dest.clone(),
            message,
            receive_time: env.receive_time(),
        });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshot protocol
    // ─────────────────────────────────────────────────────────────────────────

    /// Originate `snapshot_id` on this server.
    ///
    /// Records the current token count and sends a marker on every outbound
    /// link. Fails if this server already knows the snapshot, whether it
    /// originated it or learned of it from a marker.
    pub fn start_snapshot<E: Environment + ?Sized>(
        &mut self,
        snapshot_id: SnapshotId,
        env: &mut E,
    ) -> Result<()> {
        let Entry::Vacant(entry) = self.snapshots.entry(snapshot_id) else {
            return Err(ProtocolViolation::SnapshotAlreadyStarted {
                server: self.id.clone(),
                snapshot_id,
            });
        };
        tracing::info!(server = %self.id, snapshot_id = %snapshot_id, tokens = self.tokens, "starting snapshot");
        entry.insert(SnapshotRecord::new(self.tokens));
        broadcast(&self.id, &mut self.outbound_links, Message::marker(snapshot_id), env);

        // With no inbound links there is no marker to wait for.
        if self.inbound_links.is_empty() {
            tracing::info!(server = %self.id, snapshot_id = %snapshot_id, "snapshot complete");
            env.snapshot_complete(&self.id, snapshot_id);
        }
        Ok(())
    }

    /// Handle one message delivered on the link from `src`.
    pub fn handle_message<E: Environment + ?Sized>(
        &mut self,
        src: &ServerId,
        message: Message,
        env: &mut E,
    ) -> Result<()> {
        if !self.inbound_links.contains(src) {
            return Err(ProtocolViolation::UnknownSource {
                server: self.id.clone(),
                src: src.clone(),
            });
        }

        match message {
            Message::Marker { snapshot_id } => self.handle_marker(src, snapshot_id, env),
            Message::Token { amount } => self.handle_tokens(src, message, amount),
        }
    }

    fn handle_marker<E: Environment + ?Sized>(
        &mut self,
        src: &ServerId,
        snapshot_id: SnapshotId,
        env: &mut E,
    ) -> Result<()> {
        tracing::debug!(server = %self.id, src = %src, snapshot_id = %snapshot_id, "received marker");

        let record = match self.snapshots.entry(snapshot_id) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                // First sight of this snapshot: take the local cut now.
                tracing::info!(server = %self.id, snapshot_id = %snapshot_id, tokens = self.tokens, "joining snapshot");
                let record = e.insert(SnapshotRecord::new(self.tokens));
                broadcast(&self.id, &mut self.outbound_links, Message::marker(snapshot_id), env);
                record
            }
        };

        if !record.record_marker(src.clone()) {
            return Err(ProtocolViolation::DuplicateMarker {
                server: self.id.clone(),
                snapshot_id,
                src: src.clone(),
            });
        }

        if record.is_closed(&self.inbound_links) {
            tracing::info!(
                server = %self.id,
                snapshot_id = %snapshot_id,
                in_flight = record.messages().len(),
                "snapshot complete"
            );
            env.snapshot_complete(&self.id, snapshot_id);
        }
        Ok(())
    }

    fn handle_tokens(&mut self, src: &ServerId, message: Message, amount: u64) -> Result<()> {
        tracing::debug!(server = %self.id, src = %src, amount, "received tokens");
        let tokens = self
            .tokens
            .checked_add(amount)
            .ok_or_else(|| ProtocolViolation::TokenOverflow {
                server: self.id.clone(),
                src: src.clone(),
                held: self.tokens,
                amount,
            })?;
        for record in self.snapshots.values_mut() {
            if !record.is_closed(&self.inbound_links) {
                record.record_in_flight(src, &self.id, message);
            }
        }
        self.tokens = tokens;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshot queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Record for `snapshot_id`, if this server has seen it.
    pub fn snapshot(&self, snapshot_id: SnapshotId) -> Option<&SnapshotRecord> {
        self.snapshots.get(&snapshot_id)
    }

    /// Every record this server holds, by snapshot id.
    pub fn snapshots(&self) -> impl Iterator<Item = (SnapshotId, &SnapshotRecord)> {
        self.snapshots.iter().map(|(id, record)| (*id, record))
    }

    /// Whether the marker for `snapshot_id` has arrived on every inbound link.
    pub fn is_snapshot_complete(&self, snapshot_id: SnapshotId) -> bool {
        self.snapshots
            .get(&snapshot_id)
            .is_some_and(|record| record.is_closed(&self.inbound_links))
    }

    /// Drop the record for `snapshot_id` once the harness is done with it.
    pub fn remove_snapshot(&mut self, snapshot_id: SnapshotId) -> Option<SnapshotRecord> {
        self.snapshots.remove(&snapshot_id)
    }
}

/// Link `src` to `dest`, registering both ends.
pub fn connect(src: &mut Server, dest: &mut Server) -> Result<()> {
    if src.id == dest.id {
        return Err(ProtocolViolation::SelfLink(src.id.clone()));
    }
    if src.outbound_links.contains_key(&dest.id) || dest.inbound_links.contains(&src.id) {
        return Err(ProtocolViolation::DuplicateLink {
            src: src.id.clone(),
            dest: dest.id.clone(),
        });
    }
    src.add_outbound_link(dest.id.clone())?;
    dest.add_inbound_link(src.id.clone())
}

fn broadcast<E: Environment + ?Sized>(
    from: &ServerId,
    links: &mut BTreeMap<ServerId, Link>,
    message: Message,
    env: &mut E,
) {
    for (dest, link) in links.iter_mut() {
        env.message_sent(from, dest, &message);
        link.push(SendMessageEvent {
            src: from.clone(),
            dest: dest.clone(),
            message,
            receive_time: env.receive_time(),
        });
    }
}
