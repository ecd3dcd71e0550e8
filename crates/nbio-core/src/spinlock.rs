//! A minimal spinlock for short, rarely-contended critical sections.
//!
//! Not a general-purpose mutex: callers that expect to block for a while
//! should use `std::sync::Mutex` instead. This type exists for one
//! consumer: the run-queue's dequeue-side node reclamation, where the
//! critical section is a handful of pointer operations and contention is
//! expected to be rare (see the run-queue's module docs for why that
//! section needs mutual exclusion at all). Trimmed to exactly the surface
//! the run-queue calls — `new` and `lock` — rather than carrying
//! `try_lock`/`is_locked`/`Default`/`get_mut_unchecked` for a single-caller
//! type with no other user in this tree.

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

pub struct SpinLock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

// Safety: SpinLock provides exclusive access to T via the guard.
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    #[inline]
    pub const fn new(value: T) -> Self {
        SpinLock {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(value),
        }
    }

    #[inline]
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        loop {
            if self
                .locked
                .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
                .is_ok()
            {
                return SpinLockGuard { lock: self };
            }

            let mut spin = 0u32;
            while self.locked.load(Ordering::Relaxed) {
                spin = spin.wrapping_add(1);
                for _ in 0..spin.min(64) {
                    core::hint::spin_loop();
                }
            }
        }
    }
}

pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<'a, T> Deref for SpinLockGuard<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<'a, T> DerefMut for SpinLockGuard<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<'a, T> Drop for SpinLockGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        self.lock.locked.store(false, Ordering::Release);
    }
}
