//! Echo pool example
//!
//! Wires a [`WorkPool`], an [`OutputQueue`], and an [`InputQueue`] together
//! around an in-memory fake socket: bytes handed to the input queue are
//! echoed back out through the output queue by a listener running on a
//! pool worker.
//!
//! # Environment Variables
//!
//! - `NBIO_WORKERS=<n>` - Number of worker threads (default: 4)
//! - `NBIO_CONTENTION=<n>` - Run-queue contention factor (default: 8)
//! - `NBIO_LOG_LEVEL=<level>` - off, error, warn, info, debug, trace (default: info)

use nbio_core::env::env_get;
use nbio_core::{ninfo, Config};
use nbio_runtime::{InputQueue, OutputQueue, SelectorBridge, SessionListener, Socket, WorkPool};
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct FakeSocket {
    inbound: Mutex<VecDeque<Vec<u8>>>,
}

impl Socket for FakeSocket {
    fn read(&self, dst: &mut [u8]) -> io::Result<isize> {
        let mut inbound = self.inbound.lock().unwrap();
        match inbound.pop_front() {
            None => Ok(0),
            Some(chunk) if chunk.is_empty() => {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer closed"))
            }
            Some(chunk) => {
                let n = chunk.len().min(dst.len());
                dst[..n].copy_from_slice(&chunk[..n]);
                Ok(n as isize)
            }
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

struct EchoListener {
    output: Arc<OutputQueue>,
    received: AtomicUsize,
    closed: Arc<std::sync::atomic::AtomicBool>,
}

impl SessionListener for EchoListener {
    fn on_data_received(&self, buffer: &[u8]) {
        self.received.fetch_add(buffer.len(), Ordering::SeqCst);
        let _ = self.output.add_data(buffer);
        ninfo!("echoed {} bytes", buffer.len());
    }

    fn on_connection_closed(&self) {
        ninfo!("connection closed");
        self.closed.store(true, Ordering::SeqCst);
    }
}

fn main() {
    println!("=== nbio echo-pool example ===\n");

    let workers: usize = env_get("NBIO_WORKERS", 4);
    let contention: usize = env_get("NBIO_CONTENTION", 8);

    println!("Configuration:");
    println!("  Workers: {workers}, contention factor: {contention}");
    println!();

    let config = Config::new().threads(workers).contention_factor(contention);
    config.validate().expect("invalid pool configuration");

    let mut pool = WorkPool::new("echo-pool", config.threads, config.contention_factor);
    pool.start();
    let pool = Arc::new(pool);

    let socket = Arc::new(FakeSocket {
        inbound: Mutex::new(VecDeque::from(vec![
            b"hello, ".to_vec(),
            b"nbio".to_vec(),
            Vec::new(),
        ])),
    });
    let selector = Arc::new(InlineSelector);
    let input = InputQueue::new(&config, socket, selector, Arc::clone(&pool));
    let output = Arc::new(OutputQueue::new(config.use_direct_buffers, config.output_queue_block_size));

    let closed = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let listener = EchoListener {
        output: Arc::clone(&output),
        received: AtomicUsize::new(0),
        closed: Arc::clone(&closed),
    };
    input.set_listener_and_start(listener);

    let start = std::time::Instant::now();
    while !closed.load(Ordering::SeqCst) && start.elapsed() < Duration::from_secs(5) {
        std::thread::sleep(Duration::from_millis(20));
    }

    let mut iov = [std::io::IoSlice::new(&[]); 4];
    let staged = output.get_data(&mut iov, usize::MAX);
    println!("\nStaged {staged} bytes in the output queue for a vectored write.");

    input.stop();
    drop(input);
    if let Ok(pool) = Arc::try_unwrap(pool) {
        pool.stop_and_wait();
    }

    println!("\n=== Example Complete ===");
}
