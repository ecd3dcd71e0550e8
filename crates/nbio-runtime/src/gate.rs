//! Shared-Count Gate: a counting semaphore with a saturating ceiling.
//!
//! Idle work-pool workers park on a `Gate`; `submit` and shutdown release
//! permits to wake them. The ceiling (`max`, set to the worker count)
//! guarantees that releasing `max` permits during shutdown saturates the
//! gate and wakes every parked worker, even ones that park after the
//! release call observes saturation.

use crate::parking::{new_parking, WorkerParking};
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct Gate {
    count: AtomicUsize,
    max: usize,
    parking: Box<dyn WorkerParking>,
}

impl Gate {
    pub fn new(max: usize) -> Self {
        Self {
            count: AtomicUsize::new(0),
            max,
            parking: new_parking(),
        }
    }

    /// Decrement the count by one, parking the caller while it is zero.
    pub fn acquire(&self) {
        loop {
            let current = self.count.load(Ordering::Acquire);
            if current > 0 {
                if self
                    .count
                    .compare_exchange_weak(current, current - 1, Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return;
                }
                continue;
            }
            self.parking.park(None);
        }
    }

    /// Increment the count by `n`, clamped at `max`, and wake parked workers.
    ///
    /// Always wakes, even when already saturated — a shutdown `release(max)`
    /// must unpark a worker that parks immediately after the count reached
    /// `max` but before it observed the release.
    pub fn release(&self, n: usize) {
        if n == 0 {
            return;
        }
        loop {
            let current = self.count.load(Ordering::Acquire);
            if current >= self.max {
                self.parking.wake_all();
                return;
            }
            let new = (current + n).min(self.max);
            if self
                .count
                .compare_exchange_weak(current, new, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                if new == self.max {
                    self.parking.wake_all();
                } else {
                    for _ in 0..(new - current) {
                        self.parking.wake_one();
                    }
                }
                return;
            }
        }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn max(&self) -> usize {
        self.max
    }
}
