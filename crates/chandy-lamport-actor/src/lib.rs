//! # Chandy-Lamport Actors
//!
//! Runs every server of a topology as its own tokio task.
//!
//! ## Overview
//!
//! Each [`ServerActor`] owns one [`Server`](chandy_lamport_core::Server) and
//! a mailbox. Link events travel between mailboxes over a [`Transport`]; the
//! in-memory transport keeps every link FIFO, which is all the snapshot
//! protocol asks of the network. The [`Coordinator`] seeds snapshots, waits
//! for every server to report its record closed and gathers the records into
//! a [`GlobalSnapshot`](chandy_lamport_sim::GlobalSnapshot).
//!
//! There is no simulated clock here: delivery order across links is up to
//! the tokio scheduler.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chandy_lamport_actor::{ActorConfig, Coordinator};
//! use chandy_lamport_core::ServerId;
//! use chandy_lamport_sim::Topology;
//!
//! async fn example() -> chandy_lamport_actor::Result<()> {
//!     let topology = Topology::new()
//!         .server("A", 10)
//!         .server("B", 0)
//!         .bidirectional("A", "B");
//!     let mut coordinator = Coordinator::spawn(&topology, ActorConfig::default()).await?;
//!
//!     let id = coordinator.start_snapshot(&ServerId::new("A")).await?;
//!     coordinator.send_tokens(&ServerId::new("A"), &ServerId::new("B"), 4).await?;
//!     let snapshot = coordinator.collect_snapshot(id).await?;
//!     assert_eq!(snapshot.total_tokens(), 10);
//!
//!     coordinator.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Message Flow
//!
//! ```text
//! Coordinator          Actor A                Actor B
//!   |-- StartSnapshot -->|                       |
//!   |                    |-- Deliver(marker) --->|
//!   |<-- SnapshotComplete ----------------------|
//!   |                    |<-- Deliver(marker) ---|
//!   |<-- SnapshotComplete|                       |
//!   |-- GetSnapshot ---->|                       |
//!   |-- GetSnapshot ---------------------------->|
//! ```

pub mod actor;
pub mod coordinator;
pub mod error;
pub mod messages;
pub mod transport;

pub use actor::ServerActor;
pub use coordinator::{ActorConfig, Coordinator};
pub use error::{ActorError, Result};
pub use messages::{Command, Notification, Reply};
pub use transport::{memory::MemoryNetwork, memory::MemoryTransport, Transport};
