//! The unit of work submitted to a work pool.
//!
//! A [`Task`] is externally owned: the pool never allocates one, it only
//! moves a `Box<dyn Task>` through a run-queue and calls `run_in_pool` once
//! it is dequeued. The intrusive successor link the distilled design talks
//! about (`next`) is not a field on `Task` itself in this rendition — Rust
//! cannot retrofit a field onto an arbitrary `dyn Task` the way the source
//! language's object model can. Instead the run-queue owns a `Node<Box<dyn
//! Task>>` wrapper with the atomic link; see `nbio_runtime::run_queue`.

/// A cheap unit of work runnable on a work-pool worker thread.
///
/// Implementors should keep `run_in_pool` short and non-blocking where
/// possible — a worker spends its entire credit window (see the pool's
/// probe-all-queues loop) inside this call.
pub trait Task: Send {
    /// Execute the task. Called exactly once, from a worker thread.
    fn run_in_pool(self: Box<Self>);
}

impl<F> Task for F
where
    F: FnOnce() + Send,
{
    fn run_in_pool(self: Box<Self>) {
        (*self)()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn closure_runs_as_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let task: Box<dyn Task> = Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        task.run_in_pool();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
