//! # Chandy-Lamport Core
//!
//! The snapshot protocol as a pure state machine: servers, links and
//! per-server snapshot records.
//!
//! This crate contains no I/O, no clock and no scheduling. A driver (see the
//! `chandy-lamport-sim` and `chandy-lamport-actor` crates) owns time and
//! delivery order and feeds events to [`Server::handle_message`].
//!
//! ## Key Types
//!
//! - [`Server`] - A participant holding tokens, links and snapshot records
//! - [`Link`] - A FIFO channel from one server to another
//! - [`SnapshotRecord`] - One server's recorded state for one snapshot
//! - [`Message`] - The closed set of payloads: markers and token transfers
//! - [`Environment`] - What a server needs from its driver
//!
//! ## Protocol
//!
//! ```text
//! origin                    neighbor
//!   | record tokens            |
//!   |------ Marker(id) ------->| record tokens (first marker)
//!   |------ Token(n) --------->| not recorded: arrived after marker
//!   |<----- Token(m) ----------| recorded as in flight at origin
//!   |<----- Marker(id) --------| link cut; closed once all links are cut
//! ```
//!
//! Links must never reorder. A message is recorded as in flight for a
//! snapshot exactly when it arrives on a link whose marker has not arrived.

pub mod environment;
pub mod error;
pub mod link;
pub mod message;
pub mod server;
pub mod snapshot;
pub mod types;

pub use environment::{Environment, RecordingEnvironment};
pub use error::{ProtocolViolation, Result};
pub use link::Link;
pub use message::{Message, SendMessageEvent, SnapshotMessage};
pub use server::{connect, Server};
pub use snapshot::SnapshotRecord;
pub use types::{ServerId, SnapshotId, Tick};
