//! MPMC Run-Queue Bank: one intrusive FIFO per pool worker, any producer.
//!
//! Each [`RunQueue`] is a Michael-style node-based queue: a dummy-free
//! singly linked list with independent `head`/`tail` atomics. Producers
//! (any thread calling `submit` on the pool) enqueue without ever blocking
//! on a lock — the classic unbounded MPSC construction of swapping `tail`
//! and linking the previous node's `next`.
//!
//! Dequeue is where this queue's contract diverges from a textbook MPSC
//! queue. The swap-and-link protocol is only safe to drain from a single
//! consumer: when a dequeuer finds `head.next` still null it must decide
//! whether the queue is genuinely empty or a producer is mid-swap, and the
//! only way to tell is to wait for that producer to finish linking in.
//! With two concurrent dequeuers racing the same empty-looking tail node,
//! one of them can free the node out from under the other, or spin forever
//! waiting for a link a producer will never make (the other consumer
//! already drained it). The pool's worker loop can, in principle, have two
//! workers reach the same queue index inside the same probe pass, so
//! dequeue needs real mutual exclusion to stay memory-safe — there is no
//! `crossbeam-epoch`-style reclamation in play here, just a [`SpinLock`]
//! guarding the short pointer-chasing critical section. Enqueue stays
//! fully lock-free; only the rarer, cheaper dequeue path pays for the
//! lock, and it is expected to be uncontended in steady state since each
//! queue is drained primarily by whichever worker reaches it first.
use nbio_core::SpinLock;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

struct Node<T> {
    value: Option<T>,
    next: AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn new(value: Option<T>) -> *mut Node<T> {
        Box::into_raw(Box::new(Node {
            value,
            next: AtomicPtr::new(ptr::null_mut()),
        }))
    }
}

/// A single-producer-many, mutually-exclusive-consumer FIFO.
///
/// Holds `Box<dyn Task>`-shaped payloads in the pool, but is generic so it
/// can be unit-tested with plain values.
pub struct RunQueue<T> {
    head: AtomicPtr<Node<T>>,
    tail: AtomicPtr<Node<T>>,
    dequeue_lock: SpinLock<()>,
}

unsafe impl<T: Send> Send for RunQueue<T> {}
unsafe impl<T: Send> Sync for RunQueue<T> {}

impl<T> RunQueue<T> {
    pub fn new() -> Self {
        let stub = Node::new(None);
        Self {
            head: AtomicPtr::new(stub),
            tail: AtomicPtr::new(stub),
            dequeue_lock: SpinLock::new(()),
        }
    }

    /// Append `value`. Never blocks; safe from any number of producer threads.
    pub fn enqueue(&self, value: T) {
        let node = Node::new(Some(value));
        let prev = self.tail.swap(node, Ordering::AcqRel);
        unsafe {
            (*prev).next.store(node, Ordering::Release);
        }
    }

    /// Remove and return the oldest value, or `None` if the queue is empty.
    ///
    /// Safe to call from multiple threads; concurrent dequeuers serialize
    /// on an internal spinlock (see module docs).
    pub fn dequeue(&self) -> Option<T> {
        let _guard = self.dequeue_lock.lock();

        let head = self.head.load(Ordering::Acquire);
        let next = unsafe { (*head).next.load(Ordering::Acquire) };

        if next.is_null() {
            return None;
        }

        let value = unsafe { (*next).value.take() };
        self.head.store(next, Ordering::Release);
        unsafe {
            drop(Box::from_raw(head));
        }
        value
    }

    /// True if the queue held no elements at the moment of the check.
    pub fn is_empty(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        unsafe { (*head).next.load(Ordering::Acquire).is_null() }
    }
}

impl<T> Default for RunQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for RunQueue<T> {
    fn drop(&mut self) {
        while self.dequeue().is_some() {}
        let stub = self.head.load(Ordering::Relaxed);
        unsafe {
            drop(Box::from_raw(stub));
        }
    }
}
