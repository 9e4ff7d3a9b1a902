//! Golden scenarios with known snapshots.
//!
//! Each scenario is a topology and a script in their text formats, plus the
//! snapshots the simulator must produce. The expected snapshots do not
//! depend on the delay seed: every recorded value is forced by link FIFO
//! order alone.

use chandy_lamport_core::{Message, ServerId, SnapshotId, SnapshotMessage};
use chandy_lamport_sim::{GlobalSnapshot, Result, Script, Topology};

/// A golden scenario.
#[derive(Debug, Clone)]
pub struct GoldenScenario {
    /// Human-readable name for the scenario.
    pub name: &'static str,
    /// Topology in the text format.
    pub topology: &'static str,
    /// Script in the text format.
    pub script: &'static str,
    /// One entry per snapshot the script starts, in start order.
    pub expected: &'static [ExpectedSnapshot],
}

/// What one snapshot must record.
#[derive(Debug, Clone)]
pub struct ExpectedSnapshot {
    /// Recorded tokens per server.
    pub tokens: &'static [(&'static str, u64)],
    /// In-flight transfers as `(src, dest, amount)`, grouped by receiver.
    pub in_flight: &'static [(&'static str, &'static str, u64)],
}

impl GoldenScenario {
    /// Parse the topology.
    pub fn topology(&self) -> Result<Topology> {
        self.topology.parse()
    }

    /// Parse the script.
    pub fn script(&self) -> Result<Script> {
        self.script.parse()
    }

    /// The expected snapshots, with ids assigned from zero.
    pub fn expected_snapshots(&self) -> Vec<GlobalSnapshot> {
        self.expected
            .iter()
            .enumerate()
            .map(|(i, expected)| GlobalSnapshot {
                id: SnapshotId(i as u64),
                tokens: expected
                    .tokens
                    .iter()
                    .map(|(id, tokens)| (ServerId::new(*id), *tokens))
                    .collect(),
                messages: expected
                    .in_flight
                    .iter()
                    .map(|(src, dest, amount)| SnapshotMessage {
                        src: ServerId::new(*src),
                        dest: ServerId::new(*dest),
                        message: Message::token(*amount),
                    })
                    .collect(),
            })
            .collect()
    }
}

const RING: &str = "\
3
N1 10
N2 0
N3 0
N1 N2
N2 N3
N3 N1
";

const PAIR: &str = "\
2
A 10
B 10
A B
B A
";

const RING_OF_FIVES: &str = "\
3
N1 5
N2 5
N3 5
N1 N2
N2 N3
N3 N1
";

/// Get all golden scenarios.
pub fn all_scenarios() -> Vec<GoldenScenario> {
    vec![
        GoldenScenario {
            name: "snapshot of an idle ring",
            topology: RING,
            script: "snapshot N1\n",
            expected: &[ExpectedSnapshot {
                tokens: &[("N1", 10), ("N2", 0), ("N3", 0)],
                in_flight: &[],
            }],
        },
        GoldenScenario {
            name: "transfer ahead of the marker lands before recording",
            topology: RING,
            script: "send N1 N2 3\nsnapshot N1\n",
            expected: &[ExpectedSnapshot {
                tokens: &[("N1", 7), ("N2", 3), ("N3", 0)],
                in_flight: &[],
            }],
        },
        GoldenScenario {
            name: "transfer racing toward the originator is in flight",
            topology: PAIR,
            script: "snapshot A\nsend B A 4\n",
            expected: &[ExpectedSnapshot {
                tokens: &[("A", 10), ("B", 6)],
                in_flight: &[("B", "A", 4)],
            }],
        },
        GoldenScenario {
            name: "settled transfer is recorded by the receiver",
            topology: PAIR,
            script: "send A B 4\ntick 20\nsnapshot B\n",
            expected: &[ExpectedSnapshot {
                tokens: &[("A", 6), ("B", 14)],
                in_flight: &[],
            }],
        },
        GoldenScenario {
            name: "concurrent snapshots from both ends",
            topology: PAIR,
            script: "snapshot A\nsend B A 4\nsnapshot B\n",
            expected: &[
                ExpectedSnapshot {
                    tokens: &[("A", 10), ("B", 6)],
                    in_flight: &[("B", "A", 4)],
                },
                ExpectedSnapshot {
                    tokens: &[("A", 14), ("B", 6)],
                    in_flight: &[],
                },
            ],
        },
        GoldenScenario {
            name: "marker chases transfers around a ring",
            topology: RING_OF_FIVES,
            script: "send N1 N2 2\nsnapshot N1\nsend N1 N2 1\nsend N2 N3 4\n",
            expected: &[ExpectedSnapshot {
                tokens: &[("N1", 3), ("N2", 3), ("N3", 9)],
                in_flight: &[],
            }],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chandy_lamport_sim::SimulatorConfig;

    #[test]
    fn test_scenarios_parse() {
        for scenario in all_scenarios() {
            let topology = scenario.topology().unwrap();
            let script = scenario.script().unwrap();
            assert!(topology.is_strongly_connected(), "{}", scenario.name);
            assert_eq!(script.snapshot_count(), scenario.expected.len(), "{}", scenario.name);
        }
    }

    #[test]
    fn test_expected_snapshots_conserve_tokens() {
        for scenario in all_scenarios() {
            let total = scenario.topology().unwrap().total_tokens().unwrap();
            for snapshot in scenario.expected_snapshots() {
                snapshot.verify_conservation(total).unwrap();
            }
        }
    }

    #[test]
    fn test_simulator_matches_scenarios_for_any_seed() {
        for scenario in all_scenarios() {
            let topology = scenario.topology().unwrap();
            let script = scenario.script().unwrap();
            for seed in 0..16 {
                let mut sim = topology.build(SimulatorConfig::with_seed(seed)).unwrap();
                let snapshots = script.run_to_completion(&mut sim).unwrap();
                assert_eq!(
                    snapshots,
                    scenario.expected_snapshots(),
                    "{} (seed {})",
                    scenario.name,
                    seed
                );
            }
        }
    }
}
