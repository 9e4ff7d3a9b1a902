//! Deterministic discrete-event driver.
//!
//! The simulator owns simulated time and decides delivery order. Each tick
//! it walks servers in id order and, for each, its outbound links in
//! destination order, delivering at most one ready event per sending server.
//! Only the head of a link is ever delivered, so links stay FIFO even though
//! each event draws its own random delay.

use std::collections::{BTreeMap, BTreeSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use chandy_lamport_core::{
    connect, Environment, Message, ProtocolViolation, SendMessageEvent, Server, ServerId,
    SnapshotId, Tick,
};

use crate::config::SimulatorConfig;
use crate::error::{Result, SimError};
use crate::logger::{EventLogger, LogEvent};
use crate::snapshot::GlobalSnapshot;

/// Driver state that servers see through [`Environment`].
struct SimContext {
    time: Tick,
    max_delay: u64,
    rng: StdRng,
    logger: EventLogger,
    /// Servers that closed each snapshot.
    completed: BTreeMap<SnapshotId, BTreeSet<ServerId>>,
}

impl Environment for SimContext {
    fn receive_time(&mut self) -> Tick {
        let delay = if self.max_delay == 0 {
            0
        } else {
            self.rng.gen_range(0..self.max_delay)
        };
        self.time + 1 + delay
    }

    fn message_sent(&mut self, from: &ServerId, to: &ServerId, message: &Message) {
        self.logger.record(LogEvent::Sent {
            src: from.clone(),
            dest: to.clone(),
            message: *message,
        });
    }

    fn snapshot_complete(&mut self, server: &ServerId, snapshot_id: SnapshotId) {
        self.logger.record(LogEvent::EndSnapshot {
            server: server.clone(),
            snapshot_id,
        });
        self.completed
            .entry(snapshot_id)
            .or_default()
            .insert(server.clone());
    }
}

/// A discrete-event simulation of servers exchanging tokens and markers.
pub struct Simulator {
    config: SimulatorConfig,
    servers: BTreeMap<ServerId, Server>,
    ctx: SimContext,
    next_snapshot_id: SnapshotId,
}

impl Simulator {
    /// Create an empty simulation.
    pub fn new(config: SimulatorConfig) -> Self {
        let ctx = SimContext {
            time: 0,
            max_delay: config.max_delay,
            rng: StdRng::seed_from_u64(config.seed),
            logger: EventLogger::new(),
            completed: BTreeMap::new(),
        };
        Self {
            config,
            servers: BTreeMap::new(),
            ctx,
            next_snapshot_id: SnapshotId(0),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Current tick.
    pub fn time(&self) -> Tick {
        self.ctx.time
    }

    /// The audit log so far.
    pub fn logger(&self) -> &EventLogger {
        &self.ctx.logger
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Topology
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a server holding `tokens`.
    pub fn add_server(&mut self, id: impl Into<ServerId>, tokens: u64) -> Result<()> {
        let id = id.into();
        if self.servers.contains_key(&id) {
            return Err(SimError::DuplicateServer(id));
        }
        if self.total_tokens().checked_add(tokens).is_none() {
            return Err(SimError::TokenOverflow(id));
        }
        self.servers.insert(id.clone(), Server::new(id, tokens));
        Ok(())
    }

    /// Add a link from `src` to `dest`.
    pub fn add_link(&mut self, src: &ServerId, dest: &ServerId) -> Result<()> {
        link_servers(&mut self.servers, src, dest)
    }

    /// Look up a server.
    pub fn server(&self, id: &ServerId) -> Option<&Server> {
        self.servers.get(id)
    }

    /// All servers, in id order.
    pub fn servers(&self) -> impl Iterator<Item = &Server> {
        self.servers.values()
    }

    /// Tokens held by servers plus tokens queued on links.
    ///
    /// Servers are only admitted while this total fits in a `u64`, and
    /// transfers conserve it.
    pub fn total_tokens(&self) -> u64 {
        self.servers
            .values()
            .map(|server| {
                let queued: u64 = server
                    .outbound_neighbors()
                    .filter_map(|dest| server.outbound_link(dest))
                    .flat_map(|link| link.iter())
                    .map(|event| event.message.tokens())
                    .sum();
                server.tokens() + queued
            })
            .sum()
    }

    /// Whether every link is empty.
    pub fn is_idle(&self) -> bool {
        self.servers.values().all(|s| s.pending_events() == 0)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Actions
    // ─────────────────────────────────────────────────────────────────────────

    /// Seed a new snapshot on `server` and return its id.
    pub fn start_snapshot(&mut self, server: &ServerId) -> Result<SnapshotId> {
        let origin = self
            .servers
            .get_mut(server)
            .ok_or_else(|| SimError::UnknownServer(server.clone()))?;
        let snapshot_id = self.next_snapshot_id;
        self.next_snapshot_id = snapshot_id.next();

        self.ctx.logger.record(LogEvent::StartSnapshot {
            server: server.clone(),
            snapshot_id,
        });
        origin.start_snapshot(snapshot_id, &mut self.ctx)?;
        Ok(snapshot_id)
    }

    /// Have `src` send `amount` tokens to `dest`.
    pub fn send_tokens(&mut self, src: &ServerId, dest: &ServerId, amount: u64) -> Result<()> {
        let server = self
            .servers
            .get_mut(src)
            .ok_or_else(|| SimError::UnknownServer(src.clone()))?;
        server.send_tokens(amount, dest, &mut self.ctx)?;
        Ok(())
    }

    /// Advance time by one tick and deliver what is ready.
    pub fn tick(&mut self) -> Result<()> {
        self.ctx.time += 1;
        self.ctx.logger.new_epoch();
        let now = self.ctx.time;

        let ids: Vec<ServerId> = self.servers.keys().cloned().collect();
        for id in &ids {
            let ready = self
                .servers
                .get_mut(id)
                .and_then(|server| server.outbound_links_mut().find_map(|link| link.pop_ready(now)));
            if let Some(event) = ready {
                self.deliver(event)?;
            }
        }
        Ok(())
    }

    fn deliver(&mut self, event: SendMessageEvent) -> Result<()> {
        let SendMessageEvent {
            src, dest, message, ..
        } = event;
        self.ctx.logger.record(LogEvent::Received {
            src: src.clone(),
            dest: dest.clone(),
            message,
        });
        let receiver = self
            .servers
            .get_mut(&dest)
            .ok_or_else(|| SimError::UnknownServer(dest.clone()))?;
        receiver
            .handle_message(&src, message, &mut self.ctx)
            .map_err(|violation| {
                tracing::warn!(tick = self.ctx.time, %violation, "aborting simulation");
                SimError::from(violation)
            })
    }

    /// Advance `n` ticks.
    pub fn run_ticks(&mut self, n: u64) -> Result<()> {
        for _ in 0..n {
            self.tick()?;
        }
        Ok(())
    }

    /// Tick until every link is empty. Returns the number of ticks taken.
    pub fn run_until_idle(&mut self) -> Result<u64> {
        let mut ticks = 0;
        while !self.is_idle() {
            if ticks >= self.config.max_ticks {
                return Err(SimError::Stalled(ticks));
            }
            self.tick()?;
            ticks += 1;
        }
        Ok(ticks)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Snapshots
    // ─────────────────────────────────────────────────────────────────────────

    /// Servers that have closed `snapshot_id`.
    pub fn completed(&self, snapshot_id: SnapshotId) -> usize {
        self.ctx
            .completed
            .get(&snapshot_id)
            .map_or(0, BTreeSet::len)
    }

    /// Whether every server has closed `snapshot_id`.
    pub fn is_snapshot_complete(&self, snapshot_id: SnapshotId) -> bool {
        self.completed(snapshot_id) == self.servers.len()
    }

    /// Tick until every server has closed `snapshot_id`, then assemble the
    /// global snapshot.
    pub fn collect_snapshot(&mut self, snapshot_id: SnapshotId) -> Result<GlobalSnapshot> {
        let mut ticks = 0;
        while !self.is_snapshot_complete(snapshot_id) {
            if ticks >= self.config.max_ticks {
                let done = self.ctx.completed.get(&snapshot_id);
                let pending = self
                    .servers
                    .keys()
                    .filter(|id| !done.is_some_and(|d| d.contains(*id)))
                    .cloned()
                    .collect();
                return Err(SimError::SnapshotIncomplete {
                    snapshot_id,
                    ticks,
                    pending,
                });
            }
            self.tick()?;
            ticks += 1;
        }

        let records = self
            .servers
            .values()
            .filter_map(|server| server.snapshot(snapshot_id).map(|r| (server.id(), r)));
        let snapshot = GlobalSnapshot::from_records(snapshot_id, records);
        tracing::info!(
            snapshot_id = %snapshot_id,
            tokens = snapshot.total_tokens(),
            in_flight = snapshot.messages.len(),
            "collected snapshot"
        );
        Ok(snapshot)
    }

    /// Drop every server's record for `snapshot_id`.
    pub fn discard_snapshot(&mut self, snapshot_id: SnapshotId) {
        for server in self.servers.values_mut() {
            server.remove_snapshot(snapshot_id);
        }
        self.ctx.completed.remove(&snapshot_id);
    }
}

/// Connect `src` to `dest` inside a server map.
pub(crate) fn link_servers(
    servers: &mut BTreeMap<ServerId, Server>,
    src: &ServerId,
    dest: &ServerId,
) -> Result<()> {
    if src == dest {
        return Err(ProtocolViolation::SelfLink(src.clone()).into());
    }
    let mut source = servers
        .remove(src)
        .ok_or_else(|| SimError::UnknownServer(src.clone()))?;
    let result = match servers.get_mut(dest) {
        Some(target) => connect(&mut source, target).map_err(SimError::from),
        None => Err(SimError::UnknownServer(dest.clone())),
    };
    servers.insert(src.clone(), source);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ServerId {
        ServerId::new(name)
    }

    fn ring(config: SimulatorConfig, tokens: &[u64]) -> Simulator {
        let mut sim = Simulator::new(config);
        let names: Vec<String> = (1..=tokens.len()).map(|i| format!("N{}", i)).collect();
        for (name, t) in names.iter().zip(tokens) {
            sim.add_server(name.as_str(), *t).unwrap();
        }
        for i in 0..names.len() {
            let next = (i + 1) % names.len();
            sim.add_link(&id(&names[i]), &id(&names[next])).unwrap();
        }
        sim
    }

    #[test]
    fn test_add_link_errors() {
        let mut sim = Simulator::new(SimulatorConfig::default());
        sim.add_server("A", 1).unwrap();
        sim.add_server("B", 1).unwrap();

        assert!(matches!(sim.add_server("A", 2), Err(SimError::DuplicateServer(_))));
        assert!(matches!(sim.add_link(&id("A"), &id("Z")), Err(SimError::UnknownServer(_))));
        assert!(matches!(sim.add_link(&id("Z"), &id("A")), Err(SimError::UnknownServer(_))));
        assert!(matches!(
            sim.add_link(&id("A"), &id("A")),
            Err(SimError::Protocol(ProtocolViolation::SelfLink(_)))
        ));
        // Failed links leave the server in place.
        assert!(sim.server(&id("A")).is_some());
    }

    #[test]
    fn test_add_server_rejects_token_overflow() {
        let mut sim = Simulator::new(SimulatorConfig::default());
        sim.add_server("A", u64::MAX).unwrap();
        assert!(matches!(
            sim.add_server("B", 1),
            Err(SimError::TokenOverflow(id)) if id.as_str() == "B"
        ));
        assert!(sim.server(&id("B")).is_none());
        sim.add_server("C", 0).unwrap();
        assert_eq!(sim.total_tokens(), u64::MAX);
    }

    #[test]
    fn test_delivery_respects_receive_time() {
        let config = SimulatorConfig {
            max_delay: 0,
            ..SimulatorConfig::default()
        };
        let mut sim = ring(config, &[5, 0]);
        sim.send_tokens(&id("N1"), &id("N2"), 5).unwrap();
        assert_eq!(sim.total_tokens(), 5);
        assert!(!sim.is_idle());

        sim.tick().unwrap();
        assert!(sim.is_idle());
        assert_eq!(sim.server(&id("N2")).unwrap().tokens(), 5);
    }

    #[test]
    fn test_snapshot_liveness_on_ring() {
        let mut sim = ring(SimulatorConfig::with_seed(11), &[10, 0, 0, 0]);
        let snapshot_id = sim.start_snapshot(&id("N1")).unwrap();
        assert_eq!(snapshot_id, SnapshotId(0));

        let snapshot = sim.collect_snapshot(snapshot_id).unwrap();
        assert_eq!(sim.completed(snapshot_id), 4);
        snapshot.verify_conservation(10).unwrap();
        assert_eq!(snapshot.tokens[&id("N1")], 10);
    }

    #[test]
    fn test_snapshot_ids_are_allocated_in_order() {
        let mut sim = ring(SimulatorConfig::default(), &[1, 1]);
        assert_eq!(sim.start_snapshot(&id("N1")).unwrap(), SnapshotId(0));
        assert_eq!(sim.start_snapshot(&id("N2")).unwrap(), SnapshotId(1));
        assert!(matches!(sim.start_snapshot(&id("N9")), Err(SimError::UnknownServer(_))));
    }

    #[test]
    fn test_transfers_during_snapshot_conserve_tokens() {
        let mut sim = ring(SimulatorConfig::with_seed(5), &[10, 10, 10]);
        let first = sim.start_snapshot(&id("N2")).unwrap();
        sim.send_tokens(&id("N1"), &id("N2"), 4).unwrap();
        sim.tick().unwrap();
        sim.send_tokens(&id("N3"), &id("N1"), 7).unwrap();
        let second = sim.start_snapshot(&id("N3")).unwrap();
        sim.send_tokens(&id("N2"), &id("N3"), 2).unwrap();

        for snapshot_id in [first, second] {
            let snapshot = sim.collect_snapshot(snapshot_id).unwrap();
            snapshot.verify_conservation(30).unwrap();
        }
        sim.run_until_idle().unwrap();
        assert_eq!(sim.total_tokens(), 30);
    }

    #[test]
    fn test_incomplete_snapshot_reports_pending_servers() {
        let config = SimulatorConfig {
            max_ticks: 20,
            ..SimulatorConfig::default()
        };
        let mut sim = Simulator::new(config);
        sim.add_server("A", 1).unwrap();
        sim.add_server("B", 1).unwrap();
        sim.add_link(&id("A"), &id("B")).unwrap();
        // Nothing links into A or C, so A closes at once and C never hears
        // of the snapshot. B waits forever for C's marker.
        sim.add_server("C", 0).unwrap();
        sim.add_link(&id("C"), &id("B")).unwrap();

        let snapshot_id = sim.start_snapshot(&id("A")).unwrap();
        match sim.collect_snapshot(snapshot_id) {
            Err(SimError::SnapshotIncomplete { pending, ticks, .. }) => {
                assert_eq!(ticks, 20);
                assert_eq!(pending, vec![id("B"), id("C")]);
            }
            other => panic!("expected incomplete snapshot, got {:?}", other.map(|s| s.id)),
        }
    }

    #[test]
    fn test_same_seed_same_log() {
        let run = |seed| {
            let mut sim = ring(SimulatorConfig::with_seed(seed), &[3, 3, 3]);
            sim.send_tokens(&id("N1"), &id("N2"), 1).unwrap();
            let snap = sim.start_snapshot(&id("N2")).unwrap();
            sim.send_tokens(&id("N3"), &id("N1"), 2).unwrap();
            sim.collect_snapshot(snap).unwrap();
            sim.run_until_idle().unwrap();
            sim.logger().entries().collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn test_discard_snapshot() {
        let mut sim = ring(SimulatorConfig::default(), &[1, 1]);
        let snap = sim.start_snapshot(&id("N1")).unwrap();
        sim.collect_snapshot(snap).unwrap();
        sim.discard_snapshot(snap);
        assert!(sim.servers().all(|s| s.snapshot(snap).is_none()));
        assert_eq!(sim.completed(snap), 0);
    }
}
