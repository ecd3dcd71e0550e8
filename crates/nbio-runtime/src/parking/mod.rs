//! Worker parking: efficient sleep/wake for idle pool workers.
//!
//! The [`Gate`](crate::gate::Gate) parks workers through this trait rather
//! than blocking on a condvar directly, so the pool gets the cheapest
//! primitive the platform offers (a futex on Linux) without the gate itself
//! knowing about syscalls.

use std::time::Duration;

/// Platform-specific worker parking mechanism.
///
/// Workers call `park()` when no work is available. Wake sources (task
/// submission, pool shutdown) call `wake_one()` or `wake_all()`.
pub trait WorkerParking: Send + Sync {
    /// Park the current thread until signaled or `timeout` elapses.
    ///
    /// Returns `true` if woken by a signal, `false` on timeout/spurious
    /// wakeup. Callers must re-check for work after returning regardless
    /// of the return value — a signal can race with new work appearing.
    fn park(&self, timeout: Option<Duration>) -> bool;

    /// Wake one parked thread.
    ///
    /// If nothing is parked, the signal may be lost (not queued) — that's
    /// fine, it means workers are busy and will see the work on their own.
    fn wake_one(&self);

    /// Wake every parked thread. Used for pool shutdown.
    fn wake_all(&self);

    /// Number of currently parked threads (hint, may be stale).
    fn parked_count(&self) -> usize;
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexParking as PlatformParking;
    } else {
        mod fallback;
        pub use fallback::FallbackParking as PlatformParking;
    }
}

/// Construct a new platform-appropriate parking instance.
pub fn new_parking() -> Box<dyn WorkerParking> {
    Box::new(PlatformParking::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn park_times_out() {
        let parking = new_parking();
        let start = std::time::Instant::now();
        let woken = parking.park(Some(Duration::from_millis(40)));
        let elapsed = start.elapsed();

        assert!(!woken || elapsed < Duration::from_millis(200));
        assert!(elapsed >= Duration::from_millis(30));
    }

    #[test]
    fn wake_one_unparks_a_waiter() {
        let parking = Arc::new(PlatformParking::new());
        let parking2 = Arc::clone(&parking);

        let handle = thread::spawn(move || parking2.park(Some(Duration::from_secs(10))));

        while parking.parked_count() == 0 {
            thread::yield_now();
        }
        parking.wake_one();

        assert!(handle.join().unwrap());
    }

    #[test]
    fn wake_all_unparks_every_waiter() {
        let parking = Arc::new(PlatformParking::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let p = Arc::clone(&parking);
                thread::spawn(move || p.park(Some(Duration::from_secs(10))))
            })
            .collect();

        while parking.parked_count() < 4 {
            thread::yield_now();
        }
        parking.wake_all();

        for h in handles {
            assert!(h.join().unwrap());
        }
    }
}
