//! Global snapshots assembled from per-server records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use chandy_lamport_core::{ServerId, SnapshotId, SnapshotMessage, SnapshotRecord};

use crate::error::{Result, SimError};

/// The recorded state of the whole system for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSnapshot {
    /// Which snapshot this is.
    pub id: SnapshotId,
    /// Recorded token count per server.
    pub tokens: BTreeMap<ServerId, u64>,
    /// Messages recorded as in flight, grouped by receiving server in id order.
    pub messages: Vec<SnapshotMessage>,
}

impl GlobalSnapshot {
    /// Assemble from each server's record.
    pub fn from_records<'a, I>(id: SnapshotId, records: I) -> Self
    where
        I: IntoIterator<Item = (&'a ServerId, &'a SnapshotRecord)>,
    {
        let mut tokens = BTreeMap::new();
        let mut by_server: BTreeMap<&ServerId, &[SnapshotMessage]> = BTreeMap::new();
        for (server, record) in records {
            tokens.insert(server.clone(), record.tokens());
            by_server.insert(server, record.messages());
        }
        let messages = by_server.into_values().flatten().cloned().collect();
        Self {
            id,
            tokens,
            messages,
        }
    }

    /// Tokens carried by in-flight messages, saturating at `u64::MAX`.
    pub fn in_flight_tokens(&self) -> u64 {
        self.in_flight()
            .fold(0u64, |total, tokens| total.saturating_add(tokens))
    }

    /// Recorded tokens plus in-flight tokens, saturating at `u64::MAX`.
    pub fn total_tokens(&self) -> u64 {
        self.checked_total().unwrap_or(u64::MAX)
    }

    /// Check that the snapshot accounts for exactly `expected` tokens.
    pub fn verify_conservation(&self, expected: u64) -> Result<()> {
        if self.checked_total() != Some(expected) {
            return Err(SimError::ConservationViolated {
                snapshot_id: self.id,
                expected,
                actual: self.total_tokens(),
            });
        }
        Ok(())
    }

    fn in_flight(&self) -> impl Iterator<Item = u64> + '_ {
        self.messages.iter().map(|m| m.message.tokens())
    }

    fn checked_total(&self) -> Option<u64> {
        self.tokens
            .values()
            .copied()
            .chain(self.in_flight())
            .try_fold(0u64, u64::checked_add)
    }
}
