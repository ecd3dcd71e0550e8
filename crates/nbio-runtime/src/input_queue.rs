//! Input queue: selector/worker coordination for a single-reader receive pipeline.
//!
//! A selector thread arms read-readiness; when the socket becomes
//! readable it hands a runnable to the work pool, where a worker performs
//! the actual `recv`, appends into the block chain, and delivers to the
//! [`SessionListener`]. The `length`+`CLOSED` atomic word is what a caller
//! of `handleData` uses to know when to stop walking the chain; the actual
//! mutual exclusion between overlapping worker-role invocations (so only
//! one thread is ever mid-`recv`-and-deliver for a session) is enforced by
//! an internal lock around that whole critical section, since two workers
//! racing a real non-blocking socket `read()` with no exclusion at all
//! would corrupt the chain.

use crate::block::DataBlock;
use crate::collab::{SelectorBridge, SessionListener, Socket};
use crate::pool::WorkPool;
use crate::thread_local_cache;
use nbio_core::constants::{INPUT_CLOSED_BIT, INPUT_LENGTH_MASK};
use nbio_core::Config;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

struct Chain {
    head: Option<Box<DataBlock>>,
    tail: *mut DataBlock,
}

// Safety: all access to `Chain` goes through `InputQueue::io_lock`.
unsafe impl Send for Chain {}

struct Inner {
    state: AtomicU32,
    stopped: AtomicBool,
    block_size: usize,
    socket: Arc<dyn Socket>,
    selector: Arc<dyn SelectorBridge>,
    pool: Arc<WorkPool>,
    listener: Mutex<Option<Arc<dyn SessionListener>>>,
    chain: Mutex<Chain>,
    io_lock: Mutex<()>,
}

/// Couples a socket, a selector thread, and a work pool to deliver bytes to
/// a [`SessionListener`] as they arrive.
pub struct InputQueue {
    inner: Arc<Inner>,
}

impl InputQueue {
    pub fn new(
        config: &Config,
        socket: Arc<dyn Socket>,
        selector: Arc<dyn SelectorBridge>,
        pool: Arc<WorkPool>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: AtomicU32::new(0),
                stopped: AtomicBool::new(false),
                block_size: config.input_queue_block_size,
                socket,
                selector,
                pool,
                listener: Mutex::new(None),
                chain: Mutex::new(Chain {
                    head: None,
                    tail: std::ptr::null_mut(),
                }),
                io_lock: Mutex::new(()),
            }),
        }
    }

    /// Register the listener and arm the selector for the first time.
    pub fn set_listener_and_start(&self, listener: impl SessionListener + 'static) {
        *self.inner.listener.lock().unwrap() = Some(Arc::new(listener));
        self.arm_selector();
    }

    /// Clear read-interest and suppress further selector resubmission.
    ///
    /// Already-buffered bytes are not drained; a partially buffered cohort
    /// is dropped (documented design choice, see the project docs).
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.socket.set_read_interest(false);
    }

    fn arm_selector(&self) {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        self.inner
            .selector
            .execute_in_selector_thread(Box::new(move || {
                if inner.stopped.load(Ordering::SeqCst) {
                    return;
                }
                inner.socket.set_read_interest(true);
                let for_pool = Arc::clone(&inner);
                inner.pool.submit(move || worker_entry(for_pool));
            }));
    }

    fn resubmit_selector_arm(&self) {
        self.arm_selector();
    }
}

fn worker_entry(inner: Arc<Inner>) {
    if inner.stopped.load(Ordering::SeqCst) {
        return;
    }
    let _guard = inner.io_lock.lock().unwrap();
    if inner.stopped.load(Ordering::SeqCst) {
        return;
    }

    let raw = inner.state.load(Ordering::Acquire);
    let length = raw & INPUT_LENGTH_MASK;

    if length == 0 {
        read_fresh_cohort(&inner);
    } else {
        read_append(&inner);
    }
}

fn read_fresh_cohort(inner: &Arc<Inner>) {
    let mut block = thread_local_cache::acquire(inner.block_size);
    let read_result = block.fill_from(0, &mut |dst| inner.socket.read(dst));

    match read_result {
        Ok(n) if n > 0 => {
            let n = n as usize;
            block.write_view_mut().advance(n);
            let ptr: *mut DataBlock = &mut *block;
            {
                let mut chain = inner.chain.lock().unwrap();
                chain.head = Some(block);
                chain.tail = ptr;
            }
            inner.state.fetch_add(n as u32, Ordering::AcqRel);
            queue_resubmit_and_deliver(inner);
        }
        Ok(_) => {
            thread_local_cache::put(block);
        }
        Err(_) => {
            thread_local_cache::put(block);
            mark_closed(inner);
            maybe_notify_closed(inner);
        }
    }
}

/// Continue filling the session's receive chain. If the current tail block
/// still has room, fills it in place at its own write cursor rather than
/// rotating in a fresh block; only a full tail triggers a new allocation.
///
/// Writing through the raw `chain.tail` pointer without holding
/// `inner.chain` for the read is sound because `worker_entry` holds
/// `inner.io_lock` for the whole call: no other invocation of this
/// function, and no other writer of the tail block's contents, can be
/// running concurrently. `handle_data` (invoked later in the same call)
/// only ever frees non-tail blocks, never the block this function is
/// writing into.
fn read_append(inner: &Arc<Inner>) {
    let chain = inner.chain.lock().unwrap();
    let tail_ptr = chain.tail;
    // Safety: `tail_ptr` is non-null whenever `length > 0`, which is the
    // only way `worker_entry` reaches this function.
    let write_pos = unsafe { (*tail_ptr).write_view().position() };
    let tail_full = write_pos >= inner.block_size;
    drop(chain);

    if !tail_full {
        let read_result =
            unsafe { (*tail_ptr).fill_from(write_pos, &mut |dst| inner.socket.read(dst)) };
        return finish_read_append(inner, read_result, |n| unsafe {
            (*tail_ptr).write_view_mut().advance(n);
        });
    }

    let mut new_block = thread_local_cache::acquire(inner.block_size);
    let read_result = new_block.fill_from(0, &mut |dst| inner.socket.read(dst));
    match read_result {
        Ok(n) if n > 0 => {
            let n = n as usize;
            new_block.write_view_mut().advance(n);
            let ptr: *mut DataBlock = &mut *new_block;

            let mut chain = inner.chain.lock().unwrap();
            if let Some(tail) = unsafe { chain.tail.as_mut() } {
                tail.set_next(new_block);
            } else {
                chain.head = Some(new_block);
            }
            chain.tail = ptr;
            drop(chain);

            on_append_success(inner, n);
        }
        Ok(_) => thread_local_cache::put(new_block),
        Err(_) => {
            thread_local_cache::put(new_block);
            on_append_error(inner);
        }
    }
}

fn finish_read_append(
    inner: &Arc<Inner>,
    read_result: std::io::Result<isize>,
    on_success: impl FnOnce(usize),
) {
    match read_result {
        Ok(n) if n > 0 => {
            on_success(n as usize);
            on_append_success(inner, n as usize);
        }
        Ok(_) => {}
        Err(_) => on_append_error(inner),
    }
}

fn on_append_success(inner: &Arc<Inner>, n: usize) {
    let raw_before = inner.state.load(Ordering::Acquire);
    let pre_add_length = raw_before & INPUT_LENGTH_MASK;

    inner.state.fetch_add(n as u32, Ordering::AcqRel);
    if pre_add_length == 0 {
        queue_resubmit_and_deliver(inner);
    } else {
        resubmit_only(inner);
    }
}

fn on_append_error(inner: &Arc<Inner>) {
    mark_closed(inner);
    let raw = inner.state.load(Ordering::Acquire);
    if raw & INPUT_LENGTH_MASK == 0 {
        maybe_notify_closed(inner);
    }
}

fn mark_closed(inner: &Arc<Inner>) {
    loop {
        let raw = inner.state.load(Ordering::Acquire);
        let new = raw | INPUT_CLOSED_BIT;
        if raw == new
            || inner
                .state
                .compare_exchange_weak(raw, new, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            return;
        }
    }
}

fn maybe_notify_closed(inner: &Arc<Inner>) {
    if let Some(listener) = inner.listener.lock().unwrap().as_ref() {
        listener.on_connection_closed();
    }
}

fn resubmit_only(inner: &Arc<Inner>) {
    if inner.stopped.load(Ordering::SeqCst) {
        return;
    }
    let inner2 = Arc::clone(inner);
    inner.selector.execute_in_selector_thread(Box::new(move || {
        if inner2.stopped.load(Ordering::SeqCst) {
            return;
        }
        inner2.socket.set_read_interest(true);
    }));
}

fn queue_resubmit_and_deliver(inner: &Arc<Inner>) {
    resubmit_only(inner);
    handle_data(inner);
}

/// Walk the chain from the current read cursor, delivering contiguous
/// chunks to the listener and recycling exhausted blocks.
fn handle_data(inner: &Arc<Inner>) {
    loop {
        let raw = inner.state.load(Ordering::Acquire);
        let length = raw & INPUT_LENGTH_MASK;
        if length == 0 {
            if raw & INPUT_CLOSED_BIT != 0 {
                maybe_notify_closed(inner);
            }
            return;
        }

        let mut chain = inner.chain.lock().unwrap();
        let Some(mut head) = chain.head.take() else {
            return;
        };
        let is_tail = std::ptr::eq(head.as_ref() as *const DataBlock, chain.tail as *const DataBlock);
        let written = if is_tail {
            head.write_view().position()
        } else {
            head.capacity()
        };
        let position = head.read_view().position();
        let available = written.saturating_sub(position);

        if available == 0 {
            chain.head = Some(head);
            return;
        }

        let chunk = head.bytes_from(position, available).to_vec();
        head.read_view_mut().advance(available);

        let exhausted = !is_tail && head.read_view().position() >= head.capacity();
        if exhausted {
            chain.head = head.take_next();
        } else {
            chain.head = Some(head);
        }
        drop(chain);

        if let Some(listener) = inner.listener.lock().unwrap().as_ref() {
            listener.on_data_received(&chunk);
        }
        inner.state.fetch_sub(available as u32, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;
    use std::sync::atomic::AtomicUsize;

    struct FakeSocket {
        chunks: Mutex<VecDeque<Vec<u8>>>,
    }

    impl Socket for FakeSocket {
        fn read(&self, dst: &mut [u8]) -> io::Result<isize> {
            let mut chunks = self.chunks.lock().unwrap();
            match chunks.pop_front() {
                Some(data) if data.is_empty() => {
                    Err(io::Error::new(io::ErrorKind::ConnectionReset, "closed"))
                }
                Some(data) => {
                    let n = data.len().min(dst.len());
                    dst[..n].copy_from_slice(&data[..n]);
                    Ok(n as isize)
                }
                None => Ok(0),
            }
        }
        fn set_read_interest(&self, _interest: bool) {}
    }

    struct InlineSelector;
    impl SelectorBridge for InlineSelector {
        fn execute_in_selector_thread(&self, task: Box<dyn FnOnce() + Send>) {
            task();
        }
    }

    struct CollectingListener {
        total: AtomicUsize,
        closed: AtomicUsize,
        data: Mutex<Vec<u8>>,
    }

    impl SessionListener for CollectingListener {
        fn on_data_received(&self, buffer: &[u8]) {
            self.total.fetch_add(buffer.len(), Ordering::SeqCst);
            self.data.lock().unwrap().extend_from_slice(buffer);
        }
        fn on_connection_closed(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn delivers_data_then_reports_close() {
        let socket = Arc::new(FakeSocket {
            chunks: Mutex::new(VecDeque::from(vec![b"0123456789".to_vec(), Vec::new()])),
        });
        let selector = Arc::new(InlineSelector);
        let mut pool = WorkPool::new("input-test-pool", 2, 2);
        pool.start();
        let pool = Arc::new(pool);

        let config = Config::new().input_queue_block_size(64);
        let queue = InputQueue::new(&config, socket, selector, Arc::clone(&pool));

        let listener = Arc::new(CollectingListener {
            total: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
            data: Mutex::new(Vec::new()),
        });
        let listener_for_start = ListenerHandle(Arc::clone(&listener));
        queue.set_listener_and_start(listener_for_start);

        let mut waited = std::time::Duration::ZERO;
        while listener.closed.load(Ordering::SeqCst) == 0 && waited < std::time::Duration::from_secs(5)
        {
            std::thread::sleep(std::time::Duration::from_millis(5));
            waited += std::time::Duration::from_millis(5);
        }

        assert_eq!(listener.total.load(Ordering::SeqCst), 10);
        assert_eq!(*listener.data.lock().unwrap(), b"0123456789".to_vec());
        assert_eq!(listener.closed.load(Ordering::SeqCst), 1);

        drop(queue);
        if let Ok(pool) = Arc::try_unwrap(pool) {
            pool.stop_and_wait();
        }
    }

    struct ListenerHandle(Arc<CollectingListener>);
    impl SessionListener for ListenerHandle {
        fn on_data_received(&self, buffer: &[u8]) {
            self.0.on_data_received(buffer);
        }
        fn on_connection_closed(&self) {
            self.0.on_connection_closed();
        }
    }

    /// Exercises `read_append`'s tail-continuation path directly: the
    /// public flow always fully delivers a cohort before the next worker
    /// runs, so `length` is back at zero (and `read_fresh_cohort` taken)
    /// by the time a second read could observe `length > 0` through
    /// `worker_entry`. Calling `read_append` directly is the only way to
    /// pin down that a second fill continues into the existing tail block
    /// instead of rotating in a fresh one while room remains.
    #[test]
    fn read_append_fills_existing_tail_before_allocating_a_new_block() {
        let socket = Arc::new(FakeSocket {
            chunks: Mutex::new(VecDeque::from(vec![b"AAAAA".to_vec(), b"BBBBB".to_vec()])),
        });
        let selector = Arc::new(InlineSelector);
        let mut pool = WorkPool::new("input-append-test-pool", 1, 1);
        pool.start();
        let pool = Arc::new(pool);

        let inner = Arc::new(Inner {
            state: AtomicU32::new(0),
            stopped: AtomicBool::new(false),
            block_size: 32,
            socket,
            selector,
            pool: Arc::clone(&pool),
            listener: Mutex::new(None),
            chain: Mutex::new(Chain {
                head: None,
                tail: std::ptr::null_mut(),
            }),
            io_lock: Mutex::new(()),
        });

        let mut first = Box::new(DataBlock::new(inner.block_size));
        let tail_ptr: *mut DataBlock = &mut *first;
        {
            let mut chain = inner.chain.lock().unwrap();
            chain.head = Some(first);
            chain.tail = tail_ptr;
        }

        read_append(&inner);
        read_append(&inner);

        let chain = inner.chain.lock().unwrap();
        let head = chain.head.as_ref().unwrap();
        assert!(
            head.next().is_none(),
            "expected the two reads to share one block, not rotate in a second"
        );
        assert_eq!(head.write_view().position(), 10);
        drop(chain);

        drop(inner);
        if let Ok(pool) = Arc::try_unwrap(pool) {
            pool.stop_and_wait();
        }
    }
}
