//! Error types for scenario runs.

use chandy_lamport_actor::ActorError;
use chandy_lamport_core::ProtocolViolation;
use chandy_lamport_sim::SimError;
use thiserror::Error;

/// Errors that can occur while running a scenario on either driver.
#[derive(Debug, Error)]
pub enum Error {
    /// A server broke a protocol invariant.
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),

    /// Simulator error.
    #[error("simulation error: {0}")]
    Sim(#[from] SimError),

    /// Actor driver error.
    #[error("actor error: {0}")]
    Actor(#[from] ActorError),

    /// Tokens were created or destroyed over the run.
    #[error("run ended with {actual} tokens, started with {expected}")]
    TokensNotConserved { expected: u64, actual: u64 },
}

/// Result type for scenario runs.
pub type Result<T> = std::result::Result<T, Error>;
