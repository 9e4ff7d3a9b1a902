//! # Chandy-Lamport Simulator
//!
//! A deterministic discrete-event driver for the snapshot protocol.
//!
//! ## Overview
//!
//! The [`Simulator`] owns simulated time and every [`Server`](chandy_lamport_core::Server).
//! Each tick it delivers at most one ready event per sending server, walking
//! servers and links in sorted order, so a run is fully determined by its
//! topology, its script and the configured seed.
//!
//! ## Usage
//!
//! ```rust
//! use chandy_lamport_sim::{Script, SimulatorConfig, Topology};
//!
//! let topology: Topology = "3\nN1 10\nN2 0\nN3 0\nN1 N2\nN2 N3\nN3 N1\n".parse().unwrap();
//! let script: Script = "snapshot N1\nsend N1 N2 10\n".parse().unwrap();
//!
//! let mut sim = topology.build(SimulatorConfig::with_seed(7)).unwrap();
//! let snapshots = script.run_to_completion(&mut sim).unwrap();
//!
//! assert_eq!(snapshots[0].total_tokens(), topology.total_tokens().unwrap());
//! ```
//!
//! ## Audit Log
//!
//! Every send, delivery, snapshot start and snapshot end is recorded by the
//! [`EventLogger`], grouped by tick, and can be exported as JSON lines.

pub mod config;
pub mod error;
pub mod logger;
pub mod script;
pub mod simulator;
pub mod snapshot;
pub mod topology;

pub use config::SimulatorConfig;
pub use error::{Result, SimError};
pub use logger::{EventLogger, LogEntry, LogEvent};
pub use script::{Script, ScriptEvent};
pub use simulator::Simulator;
pub use snapshot::GlobalSnapshot;
pub use topology::Topology;
