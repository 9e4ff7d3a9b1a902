//! # Chandy-Lamport Testkit
//!
//! Testing utilities for the snapshot protocol and its drivers.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden scenarios**: Topologies and scripts with the snapshots they must produce
//! - **Generators**: Proptest strategies for strongly connected topologies and schedules
//! - **Fixtures**: Ready-made rings and complete graphs
//!
//! ## Golden Scenarios
//!
//! ```rust
//! use chandy_lamport_sim::SimulatorConfig;
//! use chandy_lamport_testkit::scenarios::all_scenarios;
//!
//! for scenario in all_scenarios() {
//!     let mut sim = scenario.topology().unwrap().build(SimulatorConfig::default()).unwrap();
//!     let snapshots = scenario.script().unwrap().run_to_completion(&mut sim).unwrap();
//!     assert_eq!(snapshots, scenario.expected_snapshots(), "{}", scenario.name);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use chandy_lamport_testkit::generators::{apply_schedule, RunParams};
//!
//! proptest! {
//!     #[test]
//!     fn snapshots_conserve_tokens(params: RunParams) {
//!         let mut sim = params.simulator();
//!         let total = sim.total_tokens();
//!         for id in apply_schedule(&mut sim, &params.steps).unwrap() {
//!             prop_assert_eq!(sim.collect_snapshot(id).unwrap().total_tokens(), total);
//!         }
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod scenarios;

pub use fixtures::{complete, ring, server_name};
pub use generators::{apply_schedule, topology_from_params, RunParams, Step, TopologyParams};
pub use scenarios::{all_scenarios, ExpectedSnapshot, GoldenScenario};
