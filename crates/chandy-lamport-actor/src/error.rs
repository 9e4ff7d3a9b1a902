//! Error types for the actor driver.

use thiserror::Error;

use chandy_lamport_core::{ProtocolViolation, ServerId};
use chandy_lamport_sim::SimError;

/// Errors that can occur while running servers as actors.
#[derive(Debug, Error)]
pub enum ActorError {
    /// A server broke a protocol invariant and stopped.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// The topology could not be built or a snapshot did not add up.
    #[error("simulation error: {0}")]
    Sim(#[from] SimError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// No actor runs this server.
    #[error("server not found: {0}")]
    ServerNotFound(ServerId),

    /// The actor exited before answering.
    #[error("actor for {0} stopped")]
    ActorStopped(ServerId),

    /// Timeout waiting for actors.
    #[error("timeout: {0}")]
    Timeout(String),
}

/// Result type for actor operations.
pub type Result<T> = std::result::Result<T, ActorError>;
