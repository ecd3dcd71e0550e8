//! End-to-end scenarios exercising the pool and queues across their public
//! surface, rather than a single module's internals.

use nbio_core::Config;
use nbio_runtime::{InputQueue, OutputQueue, SelectorBridge, SessionListener, Socket, WorkPool};
use std::collections::VecDeque;
use std::io;
use std::io::IoSlice;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

fn wait_until(mut predicate: impl FnMut() -> bool, timeout: Duration) -> bool {
    let start = Instant::now();
    while !predicate() {
        if start.elapsed() > timeout {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
    true
}

#[test]
fn scenario_1_pool_runs_every_task_from_many_producers() {
    let mut pool = WorkPool::new("scenario1", 2, 4);
    pool.start();
    let pool = Arc::new(pool);

    let counter = Arc::new(AtomicUsize::new(0));
    let producers: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                for _ in 0..2500 {
                    let c = Arc::clone(&counter);
                    pool.submit(move || {
                        c.fetch_add(1, Ordering::SeqCst);
                    });
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }

    assert!(wait_until(
        || counter.load(Ordering::SeqCst) == 10_000,
        Duration::from_secs(5)
    ));

    let pool = Arc::try_unwrap(pool).unwrap_or_else(|_| panic!("pool still shared"));
    pool.stop_and_wait();
    assert_eq!(counter.load(Ordering::SeqCst), 10_000);
}

#[test]
fn scenario_2_output_queue_block_16_multi_write_drain() {
    let q = OutputQueue::new(false, 16);
    q.add_data(b"AAAAA").unwrap();
    q.add_data(b"BBBBB").unwrap();
    q.add_data(b"CCCCC").unwrap();
    q.add_data(b"DDDDDDD").unwrap();

    let mut iov = [IoSlice::new(&[]); 4];
    let first = q.get_data(&mut iov, usize::MAX);
    assert_eq!(first, 15);
    q.remove_data(0, first);

    let second = q.get_data(&mut iov, usize::MAX);
    assert_eq!(second, 7);
    q.remove_data(0, second);
}

#[test]
fn scenario_3_output_queue_two_concurrent_8b_writers_sum_to_16() {
    let q = Arc::new(OutputQueue::new(false, 16));
    let q1 = Arc::clone(&q);
    let q2 = Arc::clone(&q);

    let t1 = thread::spawn(move || q1.add_data(&[1u8; 8]).unwrap());
    let t2 = thread::spawn(move || q2.add_data(&[2u8; 8]).unwrap());

    let r1 = t1.join().unwrap();
    let r2 = t2.join().unwrap();
    assert_eq!(r1 + r2, 16);
}

struct ScriptedSocket {
    reads: Mutex<VecDeque<Vec<u8>>>,
}

impl Socket for ScriptedSocket {
    fn read(&self, dst: &mut [u8]) -> io::Result<isize> {
        let mut reads = self.reads.lock().unwrap();
        match reads.pop_front() {
            Some(chunk) if chunk.is_empty() => {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "closed"))
            }
            Some(chunk) => {
                let n = chunk.len().min(dst.len());
                dst[..n].copy_from_slice(&chunk[..n]);
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

struct RecordingListener {
    bytes: Mutex<Vec<u8>>,
    callbacks: AtomicUsize,
    closed: AtomicUsize,
}

impl SessionListener for RecordingListener {
    fn on_data_received(&self, buffer: &[u8]) {
        self.callbacks.fetch_add(1, Ordering::SeqCst);
        self.bytes.lock().unwrap().extend_from_slice(buffer);
    }
    fn on_connection_closed(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

struct ListenerHandle(Arc<RecordingListener>);
impl SessionListener for ListenerHandle {
    fn on_data_received(&self, buffer: &[u8]) {
        self.0.on_data_received(buffer);
    }
    fn on_connection_closed(&self) {
        self.0.on_connection_closed();
    }
}

#[test]
fn scenario_4_input_queue_two_reads_then_close() {
    let socket = Arc::new(ScriptedSocket {
        reads: Mutex::new(VecDeque::from(vec![
            vec![0u8; 10],
            vec![1u8; 10],
            Vec::new(),
        ])),
    });
    let selector = Arc::new(InlineSelector);
    let mut pool = WorkPool::new("scenario4", 2, 2);
    pool.start();
    let pool = Arc::new(pool);

    let config = Config::new().input_queue_block_size(64);
    let queue = InputQueue::new(&config, socket, selector, Arc::clone(&pool));

    let listener = Arc::new(RecordingListener {
        bytes: Mutex::new(Vec::new()),
        callbacks: AtomicUsize::new(0),
        closed: AtomicUsize::new(0),
    });
    queue.set_listener_and_start(ListenerHandle(Arc::clone(&listener)));

    assert!(wait_until(
        || listener.closed.load(Ordering::SeqCst) == 1,
        Duration::from_secs(5)
    ));

    assert_eq!(listener.bytes.lock().unwrap().len(), 20);
    assert!(listener.callbacks.load(Ordering::SeqCst) >= 1);
    assert_eq!(listener.closed.load(Ordering::SeqCst), 1);

    drop(queue);
    if let Ok(pool) = Arc::try_unwrap(pool) {
        pool.stop_and_wait();
    }
}

#[test]
fn scenario_5_output_queue_40_bytes_into_block_16_spans_three_blocks() {
    let q = OutputQueue::new(false, 16);
    let payload = vec![9u8; 40];
    let credited = q.add_data(&payload).unwrap();
    assert_eq!(credited, 40);

    let mut iov = [IoSlice::new(&[]); 4];
    let mut total = 0usize;
    let mut slices_seen = 0usize;
    loop {
        let n = q.get_data(&mut iov, usize::MAX);
        if n == 0 {
            break;
        }
        slices_seen += 1;
        total += n as usize;
        q.remove_data(0, n);
    }
    assert_eq!(total, 40);
    assert!(slices_seen >= 1);
}

#[test]
fn scenario_6_pool_stop_joins_workers_and_saturates_gate() {
    let mut pool = WorkPool::new("scenario6", 3, 4);
    pool.start();
    for _ in 0..50 {
        pool.submit(|| {});
    }
    pool.stop_and_wait();
}
