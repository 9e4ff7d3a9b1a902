//! Spawning actors, seeding snapshots and collecting results.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use chandy_lamport_core::{Server, ServerId, SnapshotId, SnapshotRecord};
use chandy_lamport_sim::{GlobalSnapshot, Script, ScriptEvent, Topology};

use crate::actor::{ActorEnv, ServerActor};
use crate::error::{ActorError, Result};
use crate::messages::{Command, Notification};
use crate::transport::memory::MemoryNetwork;

/// Configuration for the actor driver.
#[derive(Debug, Clone)]
pub struct ActorConfig {
    /// How long to wait for every server to close a snapshot, or for the
    /// network to go quiet.
    pub collect_timeout: Duration,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            collect_timeout: Duration::from_secs(5),
        }
    }
}

/// Runs every server of a topology as a tokio task.
pub struct Coordinator {
    config: ActorConfig,
    network: Arc<MemoryNetwork>,
    handles: BTreeMap<ServerId, JoinHandle<Result<Server>>>,
    notifications: mpsc::UnboundedReceiver<Notification>,
    /// Servers that closed each snapshot.
    completed: BTreeMap<SnapshotId, BTreeSet<ServerId>>,
    next_snapshot_id: SnapshotId,
}

impl Coordinator {
    /// Build the topology and spawn one actor per server.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn spawn(topology: &Topology, config: ActorConfig) -> Result<Self> {
        let servers = topology.build_servers()?;
        let network = MemoryNetwork::new();
        let (notify_tx, notifications) = mpsc::unbounded_channel();

        let mut handles = BTreeMap::new();
        for (id, server) in servers {
            let (transport, mailbox) = network.register(id.clone()).await;
            let env = ActorEnv::new(notify_tx.clone());
            let actor = ServerActor::new(server, transport, mailbox, env);
            handles.insert(id, tokio::spawn(actor.run()));
        }
        tracing::info!(servers = handles.len(), "spawned actors");

        Ok(Self {
            config,
            network,
            handles,
            notifications,
            completed: BTreeMap::new(),
            next_snapshot_id: SnapshotId(0),
        })
    }

    /// Seed a new snapshot on `server` and return its id.
    pub async fn start_snapshot(&mut self, server: &ServerId) -> Result<SnapshotId> {
        let snapshot_id = self.next_snapshot_id;
        let result = self
            .request(server, |reply| Command::StartSnapshot { snapshot_id, reply })
            .await?;
        result?;
        self.next_snapshot_id = snapshot_id.next();
        tracing::info!(server = %server, snapshot_id = %snapshot_id, "seeded snapshot");
        Ok(snapshot_id)
    }

    /// Have `src` send `amount` tokens to `dest`.
    pub async fn send_tokens(&self, src: &ServerId, dest: &ServerId, amount: u64) -> Result<()> {
        let dest = dest.clone();
        self.request(src, |reply| Command::SendTokens {
            dest,
            amount,
            reply,
        })
        .await??;
        Ok(())
    }

    /// Current token count of `server`.
    pub async fn tokens(&self, server: &ServerId) -> Result<u64> {
        self.request(server, |reply| Command::GetTokens { reply }).await
    }

    /// `server`'s record for `snapshot_id`, if it has one.
    pub async fn snapshot_record(
        &self,
        server: &ServerId,
        snapshot_id: SnapshotId,
    ) -> Result<Option<SnapshotRecord>> {
        self.request(server, |reply| Command::GetSnapshot { snapshot_id, reply })
            .await
    }

    /// Servers that have reported closing `snapshot_id` so far.
    pub fn completed(&self, snapshot_id: SnapshotId) -> usize {
        self.completed.get(&snapshot_id).map_or(0, BTreeSet::len)
    }

    /// Wait until every server has closed `snapshot_id`, then gather the
    /// records into a global snapshot.
    pub async fn collect_snapshot(&mut self, snapshot_id: SnapshotId) -> Result<GlobalSnapshot> {
        let expected = self.handles.len();
        let timeout = self.config.collect_timeout;

        let wait = async {
            while self.completed(snapshot_id) < expected {
                match self.notifications.recv().await {
                    Some(Notification::SnapshotComplete {
                        server,
                        snapshot_id,
                    }) => {
                        self.completed.entry(snapshot_id).or_default().insert(server);
                    }
                    Some(Notification::Violation(violation)) => {
                        return Err(ActorError::Protocol(violation))
                    }
                    None => return Err(ActorError::TransportError("notifications closed".into())),
                }
            }
            Ok::<(), ActorError>(())
        };
        tokio::time::timeout(timeout, wait).await.map_err(|_| {
            ActorError::Timeout(format!("waiting for snapshot {} to close", snapshot_id))
        })??;

        let mut records = Vec::with_capacity(expected);
        for server in self.handles.keys() {
            if let Some(record) = self.snapshot_record(server, snapshot_id).await? {
                records.push((server.clone(), record));
            }
        }
        let snapshot = GlobalSnapshot::from_records(
            snapshot_id,
            records.iter().map(|(id, record)| (id, record)),
        );
        tracing::info!(
            snapshot_id = %snapshot_id,
            tokens = snapshot.total_tokens(),
            in_flight = snapshot.messages.len(),
            "collected snapshot"
        );
        Ok(snapshot)
    }

    /// Wait until no link event is in flight.
    pub async fn wait_idle(&self) -> Result<()> {
        tokio::time::timeout(self.config.collect_timeout, self.network.wait_idle())
            .await
            .map_err(|_| ActorError::Timeout("waiting for the network to drain".into()))
    }

    /// Apply a script, then collect every snapshot it started.
    ///
    /// Actors have no simulated clock, so a tick only yields to let queued
    /// deliveries run.
    pub async fn run_script(&mut self, script: &Script) -> Result<Vec<GlobalSnapshot>> {
        let mut started = Vec::new();
        for event in &script.events {
            match event {
                ScriptEvent::Tick { ticks } => {
                    for _ in 0..*ticks {
                        tokio::task::yield_now().await;
                    }
                }
                ScriptEvent::Send { src, dest, amount } => {
                    self.send_tokens(src, dest, *amount).await?
                }
                ScriptEvent::Snapshot { server } => started.push(self.start_snapshot(server).await?),
            }
        }

        let mut snapshots = Vec::with_capacity(started.len());
        for snapshot_id in started {
            snapshots.push(self.collect_snapshot(snapshot_id).await?);
        }
        Ok(snapshots)
    }

    /// Drain the network, stop every actor and return the final servers.
    pub async fn shutdown(self) -> Result<Vec<Server>> {
        self.wait_idle().await?;
        for id in self.handles.keys() {
            self.network.post(id, Command::Shutdown).await?;
        }

        let mut servers = Vec::with_capacity(self.handles.len());
        for (id, handle) in self.handles {
            let server = handle
                .await
                .map_err(|_| ActorError::ActorStopped(id.clone()))??;
            servers.push(server);
        }
        Ok(servers)
    }

    async fn request<R>(
        &self,
        server: &ServerId,
        command: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R> {
        let (tx, rx) = oneshot::channel();
        self.network.post(server, command(tx)).await?;
        rx.await.map_err(|_| ActorError::ActorStopped(server.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chandy_lamport_core::{Message, ProtocolViolation};

    fn id(name: &str) -> ServerId {
        ServerId::new(name)
    }

    fn ring() -> Topology {
        Topology::new()
            .server("A", 10)
            .server("B", 0)
            .server("C", 0)
            .link("A", "B")
            .link("B", "C")
            .link("C", "A")
    }

    #[tokio::test]
    async fn test_ring_snapshot_closes_everywhere() {
        let mut coordinator = Coordinator::spawn(&ring(), ActorConfig::default()).await.unwrap();

        let snapshot_id = coordinator.start_snapshot(&id("A")).await.unwrap();
        coordinator.send_tokens(&id("A"), &id("B"), 10).await.unwrap();

        let snapshot = coordinator.collect_snapshot(snapshot_id).await.unwrap();
        assert_eq!(coordinator.completed(snapshot_id), 3);
        assert_eq!(snapshot.tokens[&id("A")], 10);
        // The transfer left A after the marker, so B never records it.
        assert!(snapshot.messages.iter().all(|m| m.src != id("A")));
        snapshot.verify_conservation(10).unwrap();

        let servers = coordinator.shutdown().await.unwrap();
        let total: u64 = servers.iter().map(Server::tokens).sum();
        assert_eq!(total, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_snapshots_conserve_tokens() {
        let topology = Topology::new()
            .server("A", 5)
            .server("B", 5)
            .server("C", 5)
            .bidirectional("A", "B")
            .bidirectional("B", "C")
            .bidirectional("C", "A");
        let mut coordinator = Coordinator::spawn(&topology, ActorConfig::default()).await.unwrap();

        let first = coordinator.start_snapshot(&id("A")).await.unwrap();
        coordinator.send_tokens(&id("B"), &id("C"), 3).await.unwrap();
        let second = coordinator.start_snapshot(&id("C")).await.unwrap();
        coordinator.send_tokens(&id("C"), &id("A"), 2).await.unwrap();

        for snapshot_id in [first, second] {
            let snapshot = coordinator.collect_snapshot(snapshot_id).await.unwrap();
            snapshot.verify_conservation(15).unwrap();
        }
        coordinator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_requests_surface_violations() {
        let mut coordinator = Coordinator::spawn(&ring(), ActorConfig::default()).await.unwrap();

        let result = coordinator.send_tokens(&id("B"), &id("C"), 1).await;
        assert!(matches!(
            result,
            Err(ActorError::Protocol(ProtocolViolation::InsufficientTokens { .. }))
        ));
        let result = coordinator.send_tokens(&id("A"), &id("C"), 1).await;
        assert!(matches!(
            result,
            Err(ActorError::Protocol(ProtocolViolation::UnknownDestination { .. }))
        ));
        assert!(matches!(
            coordinator.start_snapshot(&id("Z")).await,
            Err(ActorError::ServerNotFound(_))
        ));

        // The actors are still alive after rejected requests.
        assert_eq!(coordinator.tokens(&id("A")).await.unwrap(), 10);
        coordinator.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_marker_stops_the_actor() {
        let topology = Topology::new().server("A", 0).server("B", 0).link("A", "B");
        let mut coordinator = Coordinator::spawn(&topology, ActorConfig::default()).await.unwrap();

        for _ in 0..2 {
            coordinator.network.in_flight();
            coordinator
                .network
                .post(
                    &id("B"),
                    Command::Deliver {
                        src: id("A"),
                        message: Message::marker(SnapshotId(0)),
                    },
                )
                .await
                .unwrap();
        }
        // The first marker closes B's record; the second is a violation.
        // A never sees snapshot 0, so collection fails on the violation.
        let result = coordinator.collect_snapshot(SnapshotId(0)).await;
        assert!(matches!(
            result,
            Err(ActorError::Protocol(ProtocolViolation::DuplicateMarker { .. }))
        ));
        assert_eq!(coordinator.completed(SnapshotId(0)), 1);
        coordinator.wait_idle().await.unwrap();
        let handle = coordinator.handles.remove(&id("B")).unwrap();
        assert!(matches!(
            handle.await.unwrap(),
            Err(ActorError::Protocol(ProtocolViolation::DuplicateMarker { .. }))
        ));
    }

    #[tokio::test]
    async fn test_failed_forward_does_not_leave_the_network_busy() {
        let topology = Topology::new()
            .server("A", 0)
            .server("B", 0)
            .bidirectional("A", "B");
        let mut coordinator = Coordinator::spawn(&topology, ActorConfig::default()).await.unwrap();

        coordinator.network.post(&id("B"), Command::Shutdown).await.unwrap();
        let handle = coordinator.handles.remove(&id("B")).unwrap();
        handle.await.unwrap().unwrap();

        // A records snapshot 0 and cannot forward its marker to the stopped B.
        coordinator.network.in_flight();
        coordinator
            .network
            .post(
                &id("A"),
                Command::Deliver {
                    src: id("B"),
                    message: Message::marker(SnapshotId(0)),
                },
            )
            .await
            .unwrap();

        coordinator.wait_idle().await.unwrap();
        assert_eq!(coordinator.network.pending(), 0);
        let handle = coordinator.handles.remove(&id("A")).unwrap();
        assert!(matches!(
            handle.await.unwrap(),
            Err(ActorError::TransportError(_))
        ));
    }
}
