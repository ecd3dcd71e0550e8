//! Portable parking using `std::sync::Condvar`.
//!
//! Used on platforms without futex support. Less efficient than
//! [`super::futex_linux::FutexParking`] but works everywhere `std` does.
//!
//! Mirrors `FutexParking`'s "consume a pending wake without blocking, else
//! wait" shape: `pending` plays the role of the futex word (a flag instead
//! of a counter, since `Condvar` has no notion of accumulated wake credits),
//! and `try_consume_wake` is the guard-already-held counterpart to the
//! futex version's CAS loop.

use super::WorkerParking;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Duration;

pub struct FallbackParking {
    pending: Mutex<bool>,
    condvar: Condvar,
    parked: AtomicUsize,
}

impl FallbackParking {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(false),
            condvar: Condvar::new(),
            parked: AtomicUsize::new(0),
        }
    }

    fn try_consume_wake(guard: &mut MutexGuard<'_, bool>) -> bool {
        if **guard {
            **guard = false;
            true
        } else {
            false
        }
    }

    fn signal(&self, wake: impl FnOnce(&Condvar)) {
        if self.parked.load(Ordering::Acquire) == 0 {
            return;
        }
        *self.pending.lock().unwrap() = true;
        wake(&self.condvar);
    }
}

impl Default for FallbackParking {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerParking for FallbackParking {
    fn park(&self, timeout: Option<Duration>) -> bool {
        self.parked.fetch_add(1, Ordering::SeqCst);

        let mut guard = self.pending.lock().unwrap();
        if Self::try_consume_wake(&mut guard) {
            self.parked.fetch_sub(1, Ordering::SeqCst);
            return true;
        }

        let woken = match timeout {
            Some(t) => {
                let (g, timeout_result) = self.condvar.wait_timeout(guard, t).unwrap();
                guard = g;
                !timeout_result.timed_out()
            }
            None => {
                guard = self.condvar.wait(guard).unwrap();
                true
            }
        };

        Self::try_consume_wake(&mut guard);
        self.parked.fetch_sub(1, Ordering::SeqCst);
        woken
    }

    fn wake_one(&self) {
        self.signal(Condvar::notify_one);
    }

    fn wake_all(&self) {
        self.signal(Condvar::notify_all);
    }

    fn parked_count(&self) -> usize {
        self.parked.load(Ordering::Relaxed)
    }
}
