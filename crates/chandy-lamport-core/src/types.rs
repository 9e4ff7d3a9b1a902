//! Strong type definitions for servers and snapshots.
//!
//! Identifiers are newtypes so a server name can never be confused with a
//! snapshot number at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a server (process) in the topology.
///
/// Ordered so that neighbor iteration is deterministic.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    /// Create a new ServerId.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServerId({})", self.0)
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ServerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ServerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of one global snapshot.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub u64);

impl SnapshotId {
    /// The next identifier in allocation order.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotId({})", self.0)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SnapshotId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Simulated time, in ticks.
pub type Tick = u64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_id_ordering() {
        let mut ids = vec![ServerId::new("N3"), ServerId::new("N1"), ServerId::new("N2")];
        ids.sort();
        let names: Vec<_> = ids.iter().map(ServerId::as_str).collect();
        assert_eq!(names, vec!["N1", "N2", "N3"]);
    }

    #[test]
    fn test_server_id_display() {
        let id = ServerId::from("N7");
        assert_eq!(format!("{}", id), "N7");
        assert_eq!(format!("{:?}", id), "ServerId(N7)");
    }

    #[test]
    fn test_snapshot_id_next() {
        assert_eq!(SnapshotId(0).next(), SnapshotId(1));
        assert_eq!(format!("{}", SnapshotId(42)), "42");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&ServerId::new("N1")).unwrap();
        assert_eq!(json, "\"N1\"");
        let json = serde_json::to_string(&SnapshotId(3)).unwrap();
        assert_eq!(json, "3");
    }
}
