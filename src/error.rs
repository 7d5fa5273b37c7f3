//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache engine.
///
/// Steady-state operations never fail: missing keys, duplicate adds and
/// removals of absent keys are normal outcomes. Only construction can fail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Construction parameters were rejected (zero capacity, TTL below the
    /// floor, zero sweep period)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The background reaper thread could not be started
    #[error("Internal error: {0}")]
    Internal(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
