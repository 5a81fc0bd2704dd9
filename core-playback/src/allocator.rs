//! # Buffer Allocator
//!
//! Fixed-size chunk pool shared by every media period the queue creates.
//!
//! ## Design
//!
//! - **Chunks**: All allocations have the same size (`individual_allocation_size`)
//! - **Recycling**: Released chunks go back to a free list instead of being dropped
//! - **Trimming**: `trim` drops free chunks until the pool fits a byte budget
//! - **Sharing**: Cheap to clone; clones share the same pool
//!
//! ## Usage
//!
//! ```rust
//! use core_playback::allocator::DefaultAllocator;
//!
//! let allocator = DefaultAllocator::new(64 * 1024);
//! let chunk = allocator.allocate();
//! assert_eq!(chunk.len(), 64 * 1024);
//! allocator.release(chunk);
//! assert_eq!(allocator.total_bytes_allocated(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One fixed-size block of memory handed out by the allocator.
#[derive(Debug)]
pub struct Allocation {
    data: Box<[u8]>,
}

impl Allocation {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

#[derive(Clone)]
pub struct DefaultAllocator {
    inner: Arc<AllocatorInner>,
}

struct AllocatorInner {
    free: parking_lot::Mutex<Vec<Allocation>>,
    individual_allocation_size: usize,
    allocated_count: AtomicUsize,
}

impl DefaultAllocator {
    /// Create an allocator handing out chunks of `individual_allocation_size` bytes.
    pub fn new(individual_allocation_size: usize) -> Self {
        Self {
            inner: Arc::new(AllocatorInner {
                free: parking_lot::Mutex::new(Vec::new()),
                individual_allocation_size,
                allocated_count: AtomicUsize::new(0),
            }),
        }
    }

    pub fn individual_allocation_size(&self) -> usize {
        self.inner.individual_allocation_size
    }

    /// Hand out a chunk, reusing a released one when available.
    ///
    /// Reused chunks are zeroed.
    pub fn allocate(&self) -> Allocation {
        self.inner.allocated_count.fetch_add(1, Ordering::AcqRel);

        if let Some(mut allocation) = self.inner.free.lock().pop() {
            allocation.data.fill(0);
            return allocation;
        }

        Allocation {
            data: vec![0u8; self.inner.individual_allocation_size].into_boxed_slice(),
        }
    }

    /// Return a chunk to the pool.
    pub fn release(&self, allocation: Allocation) {
        debug_assert_eq!(allocation.len(), self.inner.individual_allocation_size);
        self.inner.allocated_count.fetch_sub(1, Ordering::AcqRel);
        self.inner.free.lock().push(allocation);
    }

    /// Drop free chunks until the pool (in use plus free) holds at most
    /// `target_bytes`. Chunks in use are never reclaimed.
    pub fn trim(&self, target_bytes: usize) {
        let size = self.inner.individual_allocation_size.max(1);
        let target_chunks = target_bytes.div_ceil(size);
        let in_use = self.inner.allocated_count.load(Ordering::Acquire);
        let keep_free = target_chunks.saturating_sub(in_use);

        let mut free = self.inner.free.lock();
        if free.len() > keep_free {
            free.truncate(keep_free);
        }
    }

    /// Bytes currently handed out and not yet released.
    pub fn total_bytes_allocated(&self) -> usize {
        self.inner.allocated_count.load(Ordering::Acquire) * self.inner.individual_allocation_size
    }

    /// Number of released chunks waiting for reuse.
    pub fn free_chunks(&self) -> usize {
        self.inner.free.lock().len()
    }
}

impl std::fmt::Debug for DefaultAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultAllocator")
            .field(
                "individual_allocation_size",
                &self.inner.individual_allocation_size,
            )
            .field("total_bytes_allocated", &self.total_bytes_allocated())
            .field("free_chunks", &self.free_chunks())
            .finish()
    }
}
