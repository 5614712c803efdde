//! Error types for the K-System meter core.

use thiserror::Error;

/// Core error type. Fallible at construction and at ring-buffer writes
/// only; the audio-path methods (`pull_from`, `level`, `publish_to`) are
/// infallible by construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("ring buffer capacity exceeded: tried to write {attempted}, capacity is {capacity}")]
    CapacityExceeded { attempted: usize, capacity: usize },
}

/// Result type alias for the engine core.
pub type EngineResult<T> = Result<T, EngineError>;
