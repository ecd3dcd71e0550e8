//! # nbio-runtime
//!
//! The concurrency and I/O-buffering core: a multi-worker [`pool::WorkPool`]
//! fed by a bank of intrusive [`run_queue::RunQueue`]s through a
//! [`gate::Gate`], plus the two lock-free staging structures built on top
//! of shared [`block::DataBlock`]s — [`output_queue::OutputQueue`] (many
//! writers, one reader) and [`input_queue::InputQueue`] (selector/worker
//! coordination for receiving). [`collab`] holds the traits the rest of a
//! network framework must implement to plug in.

pub mod block;
pub mod collab;
pub mod gate;
pub mod input_queue;
pub mod output_queue;
pub mod parking;
pub mod pool;
pub mod run_queue;
pub mod thread_local_cache;

pub use collab::{SelectorBridge, SessionListener, Socket};
pub use gate::Gate;
pub use input_queue::InputQueue;
pub use output_queue::OutputQueue;
pub use pool::WorkPool;
