//! Transport abstraction for actor mailboxes.
//!
//! A transport carries link events from the sending actor to the receiving
//! actor's mailbox. Implementations must keep events from one sender to one
//! receiver in send order.

use async_trait::async_trait;

use chandy_lamport_core::SendMessageEvent;

use crate::error::Result;

/// Transport trait for delivering link events between actors.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver `event` to `event.dest`'s mailbox.
    async fn send(&self, event: SendMessageEvent) -> Result<()>;

    /// Acknowledge one event delivered to the owning server. Called once per
    /// delivered event, after the receiver handled it and forwarded whatever
    /// it produced, whether or not that succeeded.
    fn delivered(&self);
}

/// An in-memory transport over tokio channels.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::{mpsc, Notify, RwLock};

    use chandy_lamport_core::ServerId;

    use crate::error::ActorError;
    use crate::messages::Command;

    /// Shared state for the memory transport network.
    pub struct MemoryNetwork {
        /// Mailbox senders for each server.
        mailboxes: RwLock<HashMap<ServerId, mpsc::UnboundedSender<Command>>>,
        /// Link events sent but not yet fully handled by their receiver.
        pending: AtomicUsize,
        /// Signalled whenever `pending` drops to zero.
        idle: Notify,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Register a mailbox and return a transport sending on behalf of
        /// `server_id`.
        pub async fn register(
            self: &Arc<Self>,
            server_id: ServerId,
        ) -> (MemoryTransport, mpsc::UnboundedReceiver<Command>) {
            let (tx, rx) = mpsc::unbounded_channel();
            self.mailboxes.write().await.insert(server_id.clone(), tx);

            let transport = MemoryTransport {
                server_id,
                network: Arc::clone(self),
            };
            (transport, rx)
        }

        /// Post a command to `server`'s mailbox.
        pub async fn post(&self, server: &ServerId, command: Command) -> Result<()> {
            let mailboxes = self.mailboxes.read().await;
            let mailbox = mailboxes
                .get(server)
                .ok_or_else(|| ActorError::ServerNotFound(server.clone()))?;
            mailbox
                .send(command)
                .map_err(|_| ActorError::ActorStopped(server.clone()))
        }

        /// Number of link events in flight.
        pub fn pending(&self) -> usize {
            self.pending.load(Ordering::SeqCst)
        }

        /// Resolve once no link event is in flight.
        pub async fn wait_idle(&self) {
            loop {
                let mut notified = std::pin::pin!(self.idle.notified());
                // Register before checking so a drop to zero in between is not missed.
                notified.as_mut().enable();
                if self.pending() == 0 {
                    return;
                }
                notified.await;
            }
        }

        /// Called just before an event enters a mailbox.
        pub(crate) fn in_flight(&self) {
            self.pending.fetch_add(1, Ordering::SeqCst);
        }

        /// Called once an event has been fully handled, or failed to enqueue.
        pub(crate) fn delivered(&self) {
            if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                self.idle.notify_waiters();
            }
        }
    }

    impl Default for MemoryNetwork {
        fn default() -> Self {
            Self {
                mailboxes: RwLock::new(HashMap::new()),
                pending: AtomicUsize::new(0),
                idle: Notify::new(),
            }
        }
    }

    /// In-memory transport implementation.
    pub struct MemoryTransport {
        server_id: ServerId,
        network: Arc<MemoryNetwork>,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        async fn send(&self, event: SendMessageEvent) -> Result<()> {
            debug_assert_eq!(event.src, self.server_id);
            let mailboxes = self.network.mailboxes.read().await;
            let Some(mailbox) = mailboxes.get(&event.dest) else {
                return Err(ActorError::TransportError(format!(
                    "{} not found",
                    event.dest
                )));
            };
            self.network.in_flight();
            let dest = event.dest.clone();
            mailbox
                .send(Command::Deliver {
                    src: event.src,
                    message: event.message,
                })
                .map_err(|_| {
                    self.network.delivered();
                    ActorError::TransportError(format!("{} disconnected", dest))
                })
        }

        fn delivered(&self) {
            self.network.delivered();
        }
    }
}
