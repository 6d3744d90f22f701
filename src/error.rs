//! Error types for the engine core.

use std::fmt;

/// Errors that can occur while driving the engine from a control thread.
#[derive(Debug)]
pub enum EngineError {
    /// A supplied argument violates a precondition (negative length, out-of-range pan, ...).
    InvalidArgument(String),
    /// An operation was attempted against state that does not support it
    /// (editing a clip not owned by the track, for example).
    PreconditionFailed(String),
    /// Decoded or parsed data does not conform to the expected format.
    InvalidData(String),
    /// A referenced resource (typically a file path) does not exist.
    NotFound(String),
    /// A caller-supplied buffer was too small for the requested operation.
    ResourceExhausted(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Self::PreconditionFailed(msg) => write!(f, "precondition failed: {}", msg),
            Self::InvalidData(msg) => write!(f, "invalid data: {}", msg),
            Self::NotFound(msg) => write!(f, "not found: {}", msg),
            Self::ResourceExhausted(msg) => write!(f, "resource exhausted: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

/// Result type for engine control-path operations.
pub type EngineResult<T> = Result<T, EngineError>;
