//! The work-dispatch pool: `contention_factor` run-queues drained by `threads` workers.
//!
//! Submission picks a queue by a global round-robin counter (the "which
//! queue" policy is left open by the distilled design; a thread-local
//! counter would avoid the counter's own cache-line contention but a
//! shared one is simpler and matches the teacher's own scheduler, which
//! also rotates a single shared index — see DESIGN.md) and releases one
//! gate permit. Each worker holds its own queue cursor and probes every
//! queue before re-parking, so a permit released for "some queue has work"
//! is never lost even though it does not name which queue.

use crate::gate::Gate;
use crate::run_queue::RunQueue;
use nbio_core::{ndebug, nerror, PoolResult, Task};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

struct WorkerState {
    started: AtomicBool,
    cursor: AtomicUsize,
}

impl WorkerState {
    fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            cursor: AtomicUsize::new(0),
        }
    }
}

struct Shared {
    name: String,
    queues: Vec<RunQueue<Box<dyn Task>>>,
    gate: Gate,
    run: AtomicBool,
    next_queue: AtomicUsize,
    worker_states: Vec<WorkerState>,
}

/// A fixed-size pool of worker threads draining `contention_factor` run-queues.
pub struct WorkPool {
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkPool {
    /// Construct a pool, returning an error if `threads` or `contention_factor` is zero.
    pub fn try_new(
        name: impl Into<String>,
        threads: usize,
        contention_factor: usize,
    ) -> PoolResult<Self> {
        let cfg = nbio_core::Config::new()
            .threads(threads)
            .contention_factor(contention_factor);
        cfg.validate()?;

        let queues = (0..contention_factor).map(|_| RunQueue::new()).collect();
        let worker_states = (0..threads).map(|_| WorkerState::new()).collect();

        Ok(Self {
            shared: Arc::new(Shared {
                name: name.into(),
                queues,
                gate: Gate::new(threads),
                run: AtomicBool::new(false),
                next_queue: AtomicUsize::new(0),
                worker_states,
            }),
            handles: Vec::new(),
        })
    }

    /// Construct a pool. Panics if `threads` or `contention_factor` is zero.
    pub fn new(name: impl Into<String>, threads: usize, contention_factor: usize) -> Self {
        Self::try_new(name, threads, contention_factor)
            .unwrap_or_else(|e| panic!("WorkPool::new: {e}"))
    }

    fn threads(&self) -> usize {
        self.shared.worker_states.len()
    }

    /// Spawn the worker threads. Idempotent only in the sense that calling
    /// it twice spawns a second set of workers draining the same queues —
    /// callers are expected to call it exactly once, mirroring the
    /// documented contract.
    pub fn start(&mut self) {
        self.shared.run.store(true, Ordering::SeqCst);

        for i in 0..self.threads() {
            let shared = Arc::clone(&self.shared);
            let handle = std::thread::Builder::new()
                .name(format!("{}-worker-{}", shared.name, i))
                .spawn(move || worker_loop(shared, i))
                .expect("failed to spawn work-pool worker thread");
            self.handles.push(handle);
        }
    }

    /// Queue a task for execution. Never blocks; the caller is charged
    /// nothing beyond one lock-free enqueue and a gate release.
    pub fn submit<T: Task + 'static>(&self, task: T) {
        let idx = self.shared.next_queue.fetch_add(1, Ordering::Relaxed) % self.shared.queues.len();
        self.shared.queues[idx].enqueue(Box::new(task));
        self.shared.gate.release(1);
    }

    /// Signal shutdown, wake every worker, and join all threads.
    ///
    /// Tasks still sitting in a run-queue at this moment are dropped, not
    /// executed — a worker that wakes after `run` flips false finishes only
    /// the task already in hand.
    pub fn stop_and_wait(mut self) {
        self.shared.run.store(false, Ordering::SeqCst);
        self.shared.gate.release(self.threads());

        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }
}

fn worker_loop(shared: Arc<Shared>, worker_index: usize) {
    nbio_core::diag::set_worker_id(worker_index as u32);
    shared.worker_states[worker_index].started.store(true, Ordering::Relaxed);
    let num_queues = shared.queues.len();
    let mut cursor = 0usize;

    loop {
        shared.gate.acquire();
        if !shared.run.load(Ordering::SeqCst) {
            nbio_core::diag::clear_worker_id();
            return;
        }

        let mut credit = num_queues;
        while credit > 0 {
            if let Some(task) = shared.queues[cursor].dequeue() {
                shared.worker_states[worker_index].cursor.store(cursor, Ordering::Relaxed);
                run_task(task);
                credit = num_queues;
            } else {
                credit -= 1;
            }
            cursor = (cursor + 1) % num_queues;
        }

        if !shared.run.load(Ordering::SeqCst) {
            nbio_core::diag::clear_worker_id();
            return;
        }
    }
}

fn run_task(task: Box<dyn Task>) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| task.run_in_pool()));
    if result.is_err() {
        nerror!("work-pool task panicked; isolating failure and continuing");
    } else {
        ndebug!("task completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;
    use std::sync::Arc as StdArc;
    use std::time::Duration;

    #[test]
    fn zero_threads_rejected() {
        assert!(WorkPool::try_new("t", 0, 4).is_err());
    }

    #[test]
    fn zero_contention_factor_rejected() {
        assert!(WorkPool::try_new("t", 4, 0).is_err());
    }

    #[test]
    fn runs_every_submitted_task() {
        let mut pool = WorkPool::new("test-pool", 4, 8);
        pool.start();

        let counter = StdArc::new(StdAtomicUsize::new(0));
        for _ in 0..10_000 {
            let c = StdArc::clone(&counter);
            pool.submit(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }

        let mut waited = Duration::ZERO;
        while counter.load(Ordering::SeqCst) < 10_000 && waited < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(5));
            waited += Duration::from_millis(5);
        }

        assert_eq!(counter.load(Ordering::SeqCst), 10_000);
        pool.stop_and_wait();
    }

    #[test]
    fn panicking_task_does_not_kill_the_worker() {
        let mut pool = WorkPool::new("panic-pool", 2, 4);
        pool.start();

        pool.submit(|| panic!("boom"));

        let counter = StdArc::new(StdAtomicUsize::new(0));
        let c = StdArc::clone(&counter);
        pool.submit(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let mut waited = Duration::ZERO;
        while counter.load(Ordering::SeqCst) < 1 && waited < Duration::from_secs(5) {
            std::thread::sleep(Duration::from_millis(5));
            waited += Duration::from_millis(5);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        pool.stop_and_wait();
    }

    #[test]
    fn stop_and_wait_joins_every_worker() {
        let mut pool = WorkPool::new("stop-pool", 3, 4);
        pool.start();
        pool.submit(|| {});
        pool.stop_and_wait();
    }
}
