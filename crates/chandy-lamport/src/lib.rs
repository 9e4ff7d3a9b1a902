//! # Chandy-Lamport
//!
//! Distributed snapshots over a simulated token-passing network.
//!
//! ## Overview
//!
//! Servers hold tokens and pass them to neighbors over one-way FIFO links.
//! Any server may originate a snapshot; markers spread the snapshot across
//! the topology and every server records its own token count plus the
//! transfers that were in flight on its inbound links. Together the records
//! form a consistent global state: no token is lost or counted twice.
//!
//! ## Key Concepts
//!
//! - **Server**: Owns a token count, outbound links and per-snapshot records.
//! - **Marker**: Cuts a link for one snapshot. Everything sent before it
//!   belongs to the snapshot, everything after does not.
//! - **Driver**: Delivers link events. Either the deterministic simulator or
//!   one tokio task per server.
//!
//! ## Usage
//!
//! ```rust
//! use chandy_lamport::{Harness, SimulatorConfig};
//!
//! let harness = Harness::parse(
//!     "3\nN1 10\nN2 0\nN3 0\nN1 N2\nN2 N3\nN3 N1\n",
//!     "send N1 N2 4\nsnapshot N2\ntick 3\nsend N1 N2 2\n",
//! )
//! .unwrap();
//!
//! let report = harness.run_simulated(SimulatorConfig::with_seed(1)).unwrap();
//! report.verify().unwrap();
//! ```
//!
//! ## Re-exports
//!
//! - `chandy_lamport::core` - Protocol state machine (Server, Message, etc.)
//! - `chandy_lamport::sim` - Discrete-event simulator and text formats
//! - `chandy_lamport::actor` - Actor-per-server driver

pub mod error;
pub mod harness;

// Re-export component crates
pub use chandy_lamport_actor as actor;
pub use chandy_lamport_core as core;
pub use chandy_lamport_sim as sim;

// Re-export main types for convenience
pub use error::{Error, Result};
pub use harness::{Driver, Harness, Report};

// Re-export commonly used types
pub use chandy_lamport_actor::{ActorConfig, Coordinator};
pub use chandy_lamport_core::{Message, ProtocolViolation, Server, ServerId, SnapshotId};
pub use chandy_lamport_sim::{GlobalSnapshot, Script, Simulator, SimulatorConfig, Topology};
