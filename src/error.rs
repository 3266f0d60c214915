//! Typed errors for the analysis core.
//!
//! Agent-level failures (engine errors, timeouts, malformed responses) are
//! recovered by the orchestrator as sentinel results and never abort a
//! batch. Configuration errors and cancellation are request-fatal.

use thiserror::Error;

/// Errors produced by the analysis core.
#[derive(Debug, Error)]
pub enum CouncilError {
    /// An unknown specialty was requested (request-fatal configuration error).
    #[error("unknown specialty: {0}")]
    UnknownSpecialty(String),

    /// The generative engine call failed (connection, HTTP error, timeout).
    #[error("inference engine error: {0}")]
    Engine(String),

    /// The engine responded, but the payload could not be interpreted.
    #[error("malformed engine response: {0}")]
    MalformedResponse(String),

    /// The caller cancelled the request before it completed.
    #[error("analysis cancelled")]
    Cancelled,
}

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, CouncilError>;
