//! Collaborator traits: what the core consumes from the rest of a network
//! framework, without depending on any concrete selector/socket implementation.

use std::io;

/// Bridge to a single-threaded selector loop.
///
/// Contract: `execute_in_selector_thread` must never block the caller — it
/// only enqueues `task` for the selector loop to run on its own thread.
pub trait SelectorBridge: Send + Sync {
    fn execute_in_selector_thread(&self, task: Box<dyn FnOnce() + Send>);
}

/// Receives bytes and close notifications from an [`crate::input_queue::InputQueue`].
///
/// Contract: `on_connection_closed` fires exactly once per session.
/// Reentrant submission back into the work pool from either callback is
/// allowed but must not block.
pub trait SessionListener: Send + Sync {
    fn on_data_received(&self, buffer: &[u8]);
    fn on_connection_closed(&self);
}

/// A non-blocking byte-stream socket.
///
/// Contract: `read` returns `Ok(n)` with `n > 0` for data, `Ok(0)` when no
/// data is currently available (would-block), and `Err` on close or error.
pub trait Socket: Send + Sync {
    fn read(&self, dst: &mut [u8]) -> io::Result<isize>;
    fn set_read_interest(&self, interest: bool);
}
