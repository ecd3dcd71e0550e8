//! Single-slot per-thread `DataBlock` cache.
//!
//! Each worker thread reuses at most one freed block before falling back to
//! a fresh allocation. Keyed implicitly by `thread_local!` storage, so a
//! cached block is never visible to more than one logical owner at a time —
//! correctness hinges on callers only returning a block here once it is
//! fully detached (its `next` is `None`).

use crate::block::DataBlock;
use std::cell::RefCell;

thread_local! {
    static CACHE: RefCell<Option<Box<DataBlock>>> = RefCell::new(None);
}

/// Take the cached block for this thread, if any.
pub fn take() -> Option<Box<DataBlock>> {
    CACHE.with(|cell| cell.borrow_mut().take())
}

/// Return a block to this thread's cache, replacing whatever was cached.
///
/// The caller must ensure `block` is detached (no linked successor) before
/// returning it — a linked block silently drops its chain here.
pub fn put(mut block: Box<DataBlock>) {
    block.take_next();
    CACHE.with(|cell| {
        *cell.borrow_mut() = Some(block);
    });
}

/// Get a block of at least `capacity`, from cache or freshly allocated.
pub fn acquire(capacity: usize) -> Box<DataBlock> {
    match take() {
        Some(block) if block.capacity() >= capacity => block,
        _ => Box::new(DataBlock::new(capacity)),
    }
}
