//! Configuration for the work-dispatch pool and the I/O queues.

use crate::error::{ConfigError, ConfigResult};

/// Default number of run-queues a [`crate`]-consuming pool spreads submissions
/// across (see the "Contention factor" glossary entry in the project docs).
pub const DEFAULT_CONTENTION_FACTOR: usize = 8;

/// Immutable configuration snapshot, built through a consuming builder and
/// validated once at construction time.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    /// Allocate OS-backed (e.g. mmap'd) buffers instead of heap `Vec<u8>`.
    pub use_direct_buffers: bool,
    /// Bytes per data block when no subsystem-specific size is given.
    pub block_size: usize,
    /// Bytes per data block in the input queue.
    pub input_queue_block_size: usize,
    /// Bytes per data block in the output queue.
    pub output_queue_block_size: usize,
    /// Worker thread count for the work pool.
    pub threads: usize,
    /// Number of run-queues submissions are spread across.
    pub contention_factor: usize,
}

impl Default for Config {
    fn default() -> Self {
        let num_cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            use_direct_buffers: false,
            block_size: 64 * 1024,
            input_queue_block_size: 64 * 1024,
            output_queue_block_size: 64 * 1024,
            threads: num_cpus,
            contention_factor: DEFAULT_CONTENTION_FACTOR,
        }
    }
}

impl Config {
    /// Start from the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_direct_buffers(mut self, enable: bool) -> Self {
        self.use_direct_buffers = enable;
        self
    }

    pub fn block_size(mut self, bytes: usize) -> Self {
        self.block_size = bytes;
        self.input_queue_block_size = bytes;
        self.output_queue_block_size = bytes;
        self
    }

    pub fn input_queue_block_size(mut self, bytes: usize) -> Self {
        self.input_queue_block_size = bytes;
        self
    }

    pub fn output_queue_block_size(mut self, bytes: usize) -> Self {
        self.output_queue_block_size = bytes;
        self
    }

    pub fn threads(mut self, n: usize) -> Self {
        self.threads = n;
        self
    }

    pub fn contention_factor(mut self, k: usize) -> Self {
        self.contention_factor = k;
        self
    }

    /// Reject configurations that would leave a subsystem unable to run.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.threads == 0 {
            return Err(ConfigError::ZeroThreads);
        }
        if self.contention_factor == 0 {
            return Err(ConfigError::ZeroContentionFactor);
        }
        if self.block_size == 0
            || self.input_queue_block_size == 0
            || self.output_queue_block_size == 0
        {
            return Err(ConfigError::ZeroBlockSize);
        }
        Ok(())
    }
}
