//! One task per server.
//!
//! An actor owns its [`Server`] outright and handles mailbox commands one at
//! a time, so a server's state is never touched from two places at once.
//! After every command the actor drains its outbound links through the
//! transport, oldest event first, which keeps each link FIFO end to end.

use tokio::sync::mpsc;

use chandy_lamport_core::{Environment, Message, Server, ServerId, SnapshotId, Tick};

use crate::error::Result;
use crate::messages::{Command, Notification};
use crate::transport::Transport;

/// What an actor's server sees of the outside world.
pub(crate) struct ActorEnv {
    notifications: mpsc::UnboundedSender<Notification>,
}

impl ActorEnv {
    pub(crate) fn new(notifications: mpsc::UnboundedSender<Notification>) -> Self {
        Self { notifications }
    }

    fn notify(&self, notification: Notification) {
        if self.notifications.send(notification).is_err() {
            tracing::debug!("coordinator gone, dropping notification");
        }
    }
}

impl Environment for ActorEnv {
    fn receive_time(&mut self) -> Tick {
        0
    }

    fn message_sent(&mut self, from: &ServerId, to: &ServerId, message: &Message) {
        tracing::trace!(src = %from, dest = %to, ?message, "sent");
    }

    fn snapshot_complete(&mut self, server: &ServerId, snapshot_id: SnapshotId) {
        self.notify(Notification::SnapshotComplete {
            server: server.clone(),
            snapshot_id,
        });
    }
}

/// A server running in its own task.
pub struct ServerActor<T: Transport> {
    server: Server,
    transport: T,
    mailbox: mpsc::UnboundedReceiver<Command>,
    env: ActorEnv,
}

impl<T: Transport> ServerActor<T> {
    pub(crate) fn new(
        server: Server,
        transport: T,
        mailbox: mpsc::UnboundedReceiver<Command>,
        env: ActorEnv,
    ) -> Self {
        Self {
            server,
            transport,
            mailbox,
            env,
        }
    }

    /// Handle commands until shutdown. Returns the final server state.
    ///
    /// A protocol violation while handling a delivered message stops the
    /// actor: its bookkeeping can no longer be trusted. Rejected coordinator
    /// requests leave the server unchanged and are only reported back.
    pub async fn run(mut self) -> Result<Server> {
        while let Some(command) = self.mailbox.recv().await {
            match command {
                Command::Deliver { src, message } => {
                    let result = self.deliver(&src, message).await;
                    self.transport.delivered();
                    result?;
                }
                Command::StartSnapshot { snapshot_id, reply } => {
                    let result = self.server.start_snapshot(snapshot_id, &mut self.env);
                    self.flush().await?;
                    let _ = reply.send(result);
                }
                Command::SendTokens {
                    dest,
                    amount,
                    reply,
                } => {
                    let result = self.server.send_tokens(amount, &dest, &mut self.env);
                    self.flush().await?;
                    let _ = reply.send(result);
                }
                Command::GetSnapshot { snapshot_id, reply } => {
                    let _ = reply.send(self.server.snapshot(snapshot_id).cloned());
                }
                Command::GetTokens { reply } => {
                    let _ = reply.send(self.server.tokens());
                }
                Command::Shutdown => break,
            }
        }
        tracing::debug!(server = %self.server.id(), "actor stopped");
        Ok(self.server)
    }

    async fn deliver(&mut self, src: &ServerId, message: Message) -> Result<()> {
        if let Err(violation) = self.server.handle_message(src, message, &mut self.env) {
            tracing::warn!(server = %self.server.id(), %violation, "stopping actor");
            self.env.notify(Notification::Violation(violation.clone()));
            return Err(violation.into());
        }
        self.flush().await
    }

    /// Forward queued events, oldest first on each link. An event leaves its
    /// link only once the transport accepted it.
    async fn flush(&mut self) -> Result<()> {
        for link in self.server.outbound_links_mut() {
            while let Some(event) = link.peek() {
                if let Err(err) = self.transport.send(event.clone()).await {
                    tracing::warn!(
                        src = %link.src(),
                        dest = %link.dest(),
                        stranded = link.len(),
                        error = %err,
                        "forwarding failed"
                    );
                    return Err(err);
                }
                link.pop();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chandy_lamport_core::{connect, ProtocolViolation, SendMessageEvent};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::error::ActorError;

    /// Refuses every event and counts acknowledgements.
    #[derive(Default)]
    struct Refusing {
        delivered: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Transport for Refusing {
        async fn send(&self, event: SendMessageEvent) -> Result<()> {
            Err(ActorError::TransportError(format!("{} unreachable", event.dest)))
        }

        fn delivered(&self) {
            self.delivered.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn pair() -> Server {
        let mut a = Server::new("A", 5);
        let mut b = Server::new("B", 0);
        connect(&mut a, &mut b).unwrap();
        connect(&mut b, &mut a).unwrap();
        a
    }

    #[tokio::test]
    async fn test_failed_forwarding_still_acknowledges_delivery() {
        let transport = Refusing::default();
        let delivered = Arc::clone(&transport.delivered);
        let (tx, rx) = mpsc::unbounded_channel();
        let (notify_tx, _notify_rx) = mpsc::unbounded_channel();
        let actor = ServerActor::new(pair(), transport, rx, ActorEnv::new(notify_tx));

        // The marker opens a record on A, whose forwarded marker cannot be sent.
        tx.send(Command::Deliver {
            src: ServerId::new("B"),
            message: Message::marker(SnapshotId(0)),
        })
        .unwrap();
        let result = actor.run().await;

        assert!(matches!(result, Err(ActorError::TransportError(_))));
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_violation_acknowledges_and_notifies() {
        let transport = Refusing::default();
        let delivered = Arc::clone(&transport.delivered);
        let (tx, rx) = mpsc::unbounded_channel();
        let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
        let actor = ServerActor::new(pair(), transport, rx, ActorEnv::new(notify_tx));

        tx.send(Command::Deliver {
            src: ServerId::new("Z"),
            message: Message::token(1),
        })
        .unwrap();
        let result = actor.run().await;

        assert!(matches!(
            result,
            Err(ActorError::Protocol(ProtocolViolation::UnknownSource { .. }))
        ));
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert!(matches!(
            notify_rx.recv().await,
            Some(Notification::Violation(ProtocolViolation::UnknownSource { .. }))
        ));
    }

    #[tokio::test]
    async fn test_unsent_events_stay_on_their_link() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (notify_tx, _notify_rx) = mpsc::unbounded_channel();
        let mut actor = ServerActor::new(pair(), Refusing::default(), rx, ActorEnv::new(notify_tx));
        drop(tx);

        let result = actor.server.send_tokens(2, &ServerId::new("B"), &mut actor.env);
        assert!(result.is_ok());
        assert!(actor.flush().await.is_err());
        assert_eq!(actor.server.pending_events(), 1);
    }
}
