//! Proptest generators for property-based testing.
//!
//! Generated topologies are always strongly connected: a ring over every
//! server plus a handful of extra links. Generated schedules refer to servers
//! by index and are resolved against the running simulator, so a transfer is
//! clamped to what the sender holds at that moment.

use std::collections::BTreeSet;

use proptest::prelude::*;

use chandy_lamport_core::{ServerId, SnapshotId};
use chandy_lamport_sim::{Result, Simulator, SimulatorConfig, Topology};

use crate::fixtures::server_name;

/// Generate a server count.
pub fn server_count() -> impl Strategy<Value = usize> {
    2usize..=6
}

/// Generate a delay seed.
pub fn seed() -> impl Strategy<Value = u64> {
    any::<u64>()
}

/// Parameters for a strongly connected topology.
#[derive(Debug, Clone)]
pub struct TopologyParams {
    /// Initial tokens, one entry per server.
    pub tokens: Vec<u64>,
    /// Extra links by server index, on top of the ring.
    pub extra_links: Vec<(usize, usize)>,
}

impl Arbitrary for TopologyParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        server_count()
            .prop_flat_map(|n| {
                (
                    prop::collection::vec(0u64..=50, n),
                    prop::collection::vec((0..n, 0..n), 0..=n * 2),
                )
            })
            .prop_map(|(tokens, extra_links)| TopologyParams {
                tokens,
                extra_links,
            })
            .boxed()
    }
}

/// Build the topology described by `params`.
///
/// Extra links that would be self-links or duplicates are skipped.
pub fn topology_from_params(params: &TopologyParams) -> Topology {
    let n = params.tokens.len();
    let mut topology = Topology::new();
    for (i, tokens) in params.tokens.iter().enumerate() {
        topology = topology.server(server_name(i), *tokens);
    }

    let mut links = BTreeSet::new();
    let ring = (0..n).map(|i| (i, (i + 1) % n));
    for (src, dest) in ring.chain(params.extra_links.iter().copied()) {
        if src != dest && links.insert((src, dest)) {
            topology = topology.link(server_name(src), server_name(dest));
        }
    }
    topology
}

/// One step of a generated schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Transfer from server `src` to its `dest`-th outbound neighbor.
    Send { src: usize, dest: usize, amount: u64 },
    /// Originate a snapshot on server `server`.
    Snapshot { server: usize },
    /// Advance time.
    Tick { ticks: u64 },
}

/// Generate a single step.
pub fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (any::<usize>(), any::<usize>(), 1u64..=20)
            .prop_map(|(src, dest, amount)| Step::Send { src, dest, amount }),
        1 => any::<usize>().prop_map(|server| Step::Snapshot { server }),
        2 => (1u64..=5).prop_map(|ticks| Step::Tick { ticks }),
    ]
}

/// Generate a schedule of up to `max_len` steps.
pub fn schedule(max_len: usize) -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(step(), 0..=max_len)
}

/// A whole simulated run: topology, schedule and seed.
#[derive(Debug, Clone)]
pub struct RunParams {
    pub topology: TopologyParams,
    pub steps: Vec<Step>,
    pub seed: u64,
}

impl Arbitrary for RunParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (any::<TopologyParams>(), schedule(30), seed())
            .prop_map(|(topology, steps, seed)| RunParams {
                topology,
                steps,
                seed,
            })
            .boxed()
    }
}

impl RunParams {
    /// Build the simulator for this run.
    pub fn simulator(&self) -> Simulator {
        topology_from_params(&self.topology)
            .build(SimulatorConfig::with_seed(self.seed))
            .expect("generated topologies are valid")
    }
}

/// Apply `steps` to `sim`. Returns the ids of started snapshots.
///
/// Transfers are clamped to the sender's current balance and skipped when
/// it holds nothing.
pub fn apply_schedule(sim: &mut Simulator, steps: &[Step]) -> Result<Vec<SnapshotId>> {
    let ids: Vec<ServerId> = sim.servers().map(|s| s.id().clone()).collect();
    let mut started = Vec::new();
    if ids.is_empty() {
        return Ok(started);
    }

    for step in steps {
        match *step {
            Step::Send { src, dest, amount } => {
                let Some(sender) = sim.server(&ids[src % ids.len()]) else {
                    continue;
                };
                let neighbors: Vec<ServerId> = sender.outbound_neighbors().cloned().collect();
                let amount = amount.min(sender.tokens());
                if neighbors.is_empty() || amount == 0 {
                    continue;
                }
                let src = sender.id().clone();
                let dest = neighbors[dest % neighbors.len()].clone();
                sim.send_tokens(&src, &dest, amount)?;
            }
            Step::Snapshot { server } => {
                started.push(sim.start_snapshot(&ids[server % ids.len()])?);
            }
            Step::Tick { ticks } => sim.run_ticks(ticks)?,
        }
    }
    Ok(started)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use chandy_lamport_sim::LogEvent;

    proptest! {
        #[test]
        fn test_generated_topologies_are_strongly_connected(params: TopologyParams) {
            let topology = topology_from_params(&params);
            prop_assert!(topology.is_strongly_connected());
            prop_assert!(topology.build(SimulatorConfig::default()).is_ok());
        }

        #[test]
        fn test_every_snapshot_conserves_tokens(params: RunParams) {
            let mut sim = params.simulator();
            let total = sim.total_tokens();
            let started = apply_schedule(&mut sim, &params.steps).unwrap();

            for snapshot_id in started {
                let snapshot = sim.collect_snapshot(snapshot_id).unwrap();
                prop_assert_eq!(snapshot.total_tokens(), total);
            }
            sim.run_until_idle().unwrap();
            prop_assert_eq!(sim.total_tokens(), total);
        }

        #[test]
        fn test_every_server_closes_every_snapshot(params: RunParams) {
            let mut sim = params.simulator();
            let servers = params.topology.tokens.len();
            let started = apply_schedule(&mut sim, &params.steps).unwrap();

            sim.run_until_idle().unwrap();
            let mut ends: BTreeMap<(ServerId, SnapshotId), usize> = BTreeMap::new();
            for entry in sim.logger().entries() {
                if let LogEvent::EndSnapshot { server, snapshot_id } = entry.event {
                    *ends.entry((server, snapshot_id)).or_default() += 1;
                }
            }
            prop_assert_eq!(ends.len(), started.len() * servers);
            for snapshot_id in started {
                prop_assert_eq!(sim.completed(snapshot_id), servers);
                for server in sim.servers() {
                    let record = server.snapshot(snapshot_id).unwrap();
                    prop_assert_eq!(record.markers_seen(), server.inbound_neighbors());
                    prop_assert_eq!(ends.get(&(server.id().clone(), snapshot_id)), Some(&1));
                }
            }
        }

        #[test]
        fn test_runs_are_deterministic(params: RunParams) {
            let mut first = params.simulator();
            let mut second = params.simulator();
            let a = apply_schedule(&mut first, &params.steps).unwrap();
            let b = apply_schedule(&mut second, &params.steps).unwrap();
            first.run_until_idle().unwrap();
            second.run_until_idle().unwrap();

            prop_assert_eq!(&a, &b);
            let log_a: Vec<_> = first.logger().entries().collect();
            let log_b: Vec<_> = second.logger().entries().collect();
            prop_assert_eq!(log_a, log_b);
            for snapshot_id in a {
                prop_assert_eq!(
                    first.collect_snapshot(snapshot_id).unwrap(),
                    second.collect_snapshot(snapshot_id).unwrap()
                );
            }
        }
    }
}
