//! Output queue: lock-free multi-writer byte staging with "newly-readable" accounting.
//!
//! Many writer threads call [`OutputQueue::add_data`] concurrently; each
//! gets back the number of bytes its call made newly visible to the reader,
//! which can be less than (or more than) the bytes it personally wrote —
//! see the cohort-retirement protocol in the module-level state machine
//! below. Exactly one reader drains via [`OutputQueue::get_data`] and
//! [`OutputQueue::remove_data`].

use crate::block::DataBlock;
use nbio_core::constants::{
    MAX_WRITERS, OFFS_MASK, OUTPUT_SENTINEL, START_MASK, START_SHIFT, WRITERS_MASK, WRITERS_SHIFT,
};
use nbio_core::{QueueError, QueueResult};
use std::io::IoSlice;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct OutputState {
    offs: u64,
    start: u64,
    writers: u32,
}

impl OutputState {
    fn decode(word: u64) -> Self {
        OutputState {
            offs: word & OFFS_MASK,
            start: (word >> START_SHIFT) & START_MASK,
            writers: ((word >> WRITERS_SHIFT) & WRITERS_MASK) as u32,
        }
    }

    fn encode(self) -> u64 {
        (self.offs & OFFS_MASK)
            | ((self.start & START_MASK) << START_SHIFT)
            | (((self.writers as u64) & WRITERS_MASK) << WRITERS_SHIFT)
    }

    fn is_full(&self) -> bool {
        self.writers == WRITERS_MASK as u32
    }

    fn lowest_free_slot(&self) -> Option<u32> {
        let free = (!self.writers) & (WRITERS_MASK as u32);
        if free == 0 {
            None
        } else {
            Some(free.trailing_zeros())
        }
    }
}

/// A chain of fixed-size blocks staging bytes for a vectored socket write.
pub struct OutputQueue {
    state: AtomicU64,
    block_size: usize,
    /// Guards block-chain *structure*: allocating new blocks (the spill
    /// path) and freeing drained ones (`remove_data`). Which block is
    /// currently the tail is tracked separately in `tail` so that the
    /// common inline write path never has to take this lock at all —
    /// `inline` only needs to know where the tail is, not to mutate the
    /// chain's shape, and the state word's sentinel/writer-count protocol
    /// already keeps it from racing a `spill`.
    chain: Mutex<Chain>,
    /// Pointer to the current tail block. Valid as long as `chain.head` is
    /// non-empty; only `spill` ever changes it, and only while holding the
    /// sentinel (so no inline writer can be mid-write when it does).
    /// Reading it needs no lock: pointer identity, not list structure, is
    /// all a writer needs.
    tail: AtomicPtr<DataBlock>,
}

struct Chain {
    head: Option<Box<DataBlock>>,
}

impl OutputQueue {
    pub fn new(_use_direct: bool, block_size: usize) -> Self {
        assert!(block_size > 0, "OutputQueue block_size must be nonzero");
        let mut first = Box::new(DataBlock::new(block_size));
        let tail_ptr: *mut DataBlock = &mut *first;
        Self {
            state: AtomicU64::new(OutputState { offs: 0, start: 0, writers: 0 }.encode()),
            block_size,
            chain: Mutex::new(Chain { head: Some(first) }),
            tail: AtomicPtr::new(tail_ptr),
        }
    }

    /// Stage `bytes`, returning how many bytes became newly readable as a
    /// result of this call (see module docs for why that can differ from
    /// `bytes.len()`).
    pub fn add_data(&self, bytes: &[u8]) -> QueueResult<u64> {
        if bytes.len() as u64 > OFFS_MASK {
            return Err(QueueError::ChunkTooLarge {
                len: bytes.len(),
                max: OFFS_MASK,
            });
        }
        if bytes.is_empty() {
            return Ok(0);
        }

        loop {
            let raw = self.state.load(Ordering::Acquire);
            if raw == OUTPUT_SENTINEL {
                std::hint::spin_loop();
                continue;
            }
            let state = OutputState::decode(raw);
            let offs_cur = state.offs as usize;
            let space = self.block_size - offs_cur;

            if bytes.len() > space {
                if state.writers != 0 {
                    std::hint::spin_loop();
                    continue;
                }
                match self.spill(raw, state, offs_cur, space, bytes) {
                    Some(credited) => return Ok(credited),
                    None => continue,
                }
            } else if let Some(credited) = self.inline(raw, state, offs_cur, bytes) {
                return Ok(credited);
            }
        }
    }

    /// Spill path: extend the chain while holding the sentinel, writing the
    /// first `space` bytes into the current tail and the remainder into
    /// freshly allocated blocks.
    fn spill(
        &self,
        observed: u64,
        _state: OutputState,
        offs_cur: usize,
        space: usize,
        bytes: &[u8],
    ) -> Option<u64> {
        if self
            .state
            .compare_exchange(observed, OUTPUT_SENTINEL, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        let mut guard = self.chain.lock().unwrap();
        let current_tail = self.tail.load(Ordering::Acquire);
        unsafe {
            (*current_tail).write_shared(offs_cur, &bytes[..space]);
        }

        let mut remaining = &bytes[space..];
        let mut new_offs = 0u64;
        while !remaining.is_empty() {
            let take = remaining.len().min(self.block_size);
            let mut block = Box::new(DataBlock::new(self.block_size));
            block.write_at(0, &remaining[..take]);
            remaining = &remaining[take..];
            new_offs = take as u64;

            let raw_ptr: *mut DataBlock = &mut *block;
            append_block(&mut guard.head, block);
            self.tail.store(raw_ptr, Ordering::Release);
        }

        let new_state = OutputState {
            offs: new_offs,
            start: 0,
            writers: 0,
        };
        self.state.store(new_state.encode(), Ordering::Release);
        Some(bytes.len() as u64)
    }

    /// Inline path: reserve space in the current tail under CAS, copy
    /// without touching the state word again, then retire.
    fn inline(&self, observed: u64, state: OutputState, offs_cur: usize, bytes: &[u8]) -> Option<u64> {
        if state.is_full() {
            std::hint::spin_loop();
            return None;
        }
        let slot = state.lowest_free_slot()?;

        let mut new_state = state;
        new_state.offs = state.offs + bytes.len() as u64;
        new_state.writers |= 1 << slot;
        if state.writers == 0 {
            new_state.start = offs_cur as u64;
        }

        if self
            .state
            .compare_exchange_weak(observed, new_state.encode(), Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return None;
        }

        // No lock: the state-word CAS above already reserved this writer's
        // byte range, and `spill` (the only thing that ever moves `tail`)
        // cannot run concurrently with an outstanding writer slot. See the
        // `tail` field's doc comment.
        let tail_ptr = self.tail.load(Ordering::Acquire);
        unsafe {
            (*tail_ptr).write_shared(offs_cur, bytes);
        }

        Some(self.retire(slot, offs_cur, bytes.len()))
    }

    fn retire(&self, slot: u32, offs_cur: usize, len: usize) -> u64 {
        loop {
            let raw = self.state.load(Ordering::Acquire);
            debug_assert_ne!(raw, OUTPUT_SENTINEL, "sentinel held while a writer is retiring");
            let s = OutputState::decode(raw);
            let mut new = s;
            new.writers &= !(1u32 << slot);

            if new.writers == 0 {
                new.start = 0;
                if self
                    .state
                    .compare_exchange_weak(raw, new.encode(), Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return new.offs.saturating_sub(s.start);
                }
            } else if offs_cur as u64 == s.start {
                new.start = (offs_cur + len) as u64;
                if self
                    .state
                    .compare_exchange_weak(raw, new.encode(), Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return len as u64;
                }
            } else {
                if self
                    .state
                    .compare_exchange_weak(raw, new.encode(), Ordering::AcqRel, Ordering::Acquire)
                    .is_ok()
                {
                    return 0;
                }
            }
            std::hint::spin_loop();
        }
    }

    /// Fill `iov` with up to `max` bytes currently staged, starting from the
    /// oldest undrained byte. Returns the total bytes placed into `iov`.
    ///
    /// The returned slices borrow from `self`, not from the internal chain
    /// mutex guard: the guard is dropped at the end of this call, but the
    /// underlying block memory lives as long as the queue itself.
    pub fn get_data<'a>(&'a self, iov: &mut [IoSlice<'a>], max: usize) -> u64 {
        let guard = self.chain.lock().unwrap();
        let tail_ptr = self.tail.load(Ordering::Acquire);
        let mut total = 0usize;
        let mut slot = 0usize;
        let mut block = guard.head.as_deref();

        while let Some(b) = block {
            if slot >= iov.len() || total >= max {
                break;
            }
            let available = b.read_view().position();
            let written_len = if std::ptr::eq(b, tail_ptr) {
                self.current_tail_readable_len()
            } else {
                b.capacity()
            };
            if available < written_len {
                let want = (written_len - available).min(max - total);
                if want == 0 {
                    break;
                }
                // Safety: the block memory is heap-allocated and owned by
                // `self.chain`, not by this `MutexGuard` — dropping the
                // guard unlocks the mutex but does not free any block.
                // Coercing the lifetime past the guard's scope is sound
                // under the single-reader contract: nothing shrinks or
                // frees a block except `remove_data`, called by the same
                // reader after it has finished with the slices from this
                // call.
                let bytes = b.bytes_from(available, want);
                let static_bytes: &[u8] = unsafe { std::mem::transmute(bytes) };
                iov[slot] = IoSlice::new(static_bytes);
                slot += 1;
                total += want;
            }
            block = b.next();
        }
        total as u64
    }

    fn current_tail_readable_len(&self) -> usize {
        let raw = self.state.load(Ordering::Acquire);
        if raw == OUTPUT_SENTINEL {
            return 0;
        }
        let state = OutputState::decode(raw);
        if state.writers == 0 {
            state.offs as usize
        } else {
            state.start as usize
        }
    }

    /// Advance the read cursor past `bytes` bytes starting at `pos0`,
    /// releasing any block that becomes fully consumed. `pos0` is
    /// currently unused beyond documenting intent — this queue has a
    /// single reader and always drains from the current head.
    pub fn remove_data(&self, _pos0: u64, mut bytes: u64) {
        let mut guard = self.chain.lock().unwrap();
        let tail_ptr = self.tail.load(Ordering::Acquire);
        while bytes > 0 {
            let Some(head) = guard.head.as_deref_mut() else { break };
            let is_tail = std::ptr::eq(head as *const DataBlock, tail_ptr);
            let readable = if is_tail {
                self.current_tail_readable_len()
            } else {
                head.capacity()
            } - head.read_view().position();

            let take = bytes.min(readable as u64) as usize;
            head.read_view_mut().advance(take);
            bytes -= take as u64;

            let fully_drained = head.read_view().position() >= head.capacity();
            if fully_drained && !is_tail {
                let old_head = guard.head.take().unwrap();
                let mut old_head = old_head;
                guard.head = old_head.take_next();
            } else {
                break;
            }
        }
    }
}

fn append_block(head: &mut Option<Box<DataBlock>>, block: Box<DataBlock>) {
    match head {
        None => *head = Some(block),
        Some(h) => {
            let mut cur = h.as_mut();
            while cur.next().is_some() {
                cur = cur.next_mut().unwrap();
            }
            cur.set_next(block);
        }
    }
}
