//! Error types for the work-dispatch pool, the output queue, and configuration.
//!
//! Most contention in this crate is absorbed by spin-retry and never
//! surfaced (see the "Error Handling Design" notes in the project docs):
//! these enums only cover the handful of operations that are genuinely
//! fallible. Contract violations (double-stop, submitting a linked task)
//! are asserted, not represented here.

use core::fmt;

/// Result type for [`crate::config::Config`] validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Invalid [`crate::config::Config`] values, rejected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `threads` was zero; the pool would never run anything.
    ZeroThreads,
    /// `contention_factor` was zero; there would be no run-queues to submit into.
    ZeroContentionFactor,
    /// `block_size` (or `input_queue_block_size` / `output_queue_block_size`) was zero.
    ZeroBlockSize,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroThreads => write!(f, "threads must be at least 1"),
            ConfigError::ZeroContentionFactor => write!(f, "contention_factor must be at least 1"),
            ConfigError::ZeroBlockSize => write!(f, "block_size must be at least 1"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Result type for [`crate`] output-queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Errors surfaced by the output queue.
///
/// Writer-count saturation and sentinel contention are *not* represented
/// here — those are retried internally and never escape `add_data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// A single `add_data` call exceeded the 36-bit offset field's range
    /// (`2^36 - 1` bytes). Unspecified in the distilled design; this crate
    /// rejects rather than silently truncating.
    ChunkTooLarge { len: usize, max: u64 },
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::ChunkTooLarge { len, max } => {
                write!(f, "chunk of {len} bytes exceeds the {max}-byte single-write limit")
            }
        }
    }
}

impl std::error::Error for QueueError {}

/// Result type for [`crate`] work-pool construction.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors surfaced by work-pool construction.
///
/// Everything else the pool does (submission, shutdown) is infallible or
/// asserts on contract violation rather than returning an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    InvalidConfig(ConfigError),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::InvalidConfig(e) => write!(f, "invalid pool configuration: {e}"),
        }
    }
}

impl std::error::Error for PoolError {}

impl From<ConfigError> for PoolError {
    fn from(e: ConfigError) -> Self {
        PoolError::InvalidConfig(e)
    }
}
