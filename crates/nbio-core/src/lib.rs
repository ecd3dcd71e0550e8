//! # nbio-core
//!
//! Platform-agnostic types shared by the work-dispatch pool and the
//! output/input queues: the [`task::Task`] trait, [`config::Config`],
//! [`error`] types, bit-layout [`constants`], and the hand-rolled [`diag`]
//! macros this crate uses instead of an external logging facade.
//!
//! All platform-specific pieces (worker parking, the pool itself, the
//! queues) live in `nbio-runtime`.

#![allow(dead_code)]

pub mod config;
pub mod constants;
pub mod diag;
pub mod env;
pub mod error;
pub mod spinlock;
pub mod task;

pub use config::Config;
pub use error::{ConfigError, ConfigResult, PoolError, PoolResult, QueueError, QueueResult};
pub use spinlock::{SpinLock, SpinLockGuard};
pub use task::Task;
