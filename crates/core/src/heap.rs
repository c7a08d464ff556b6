//! The Lisp Heap
//!
//! A bump arena from which every heap-resident value is allocated. Records
//! are sixteen-byte aligned so that the four low bits of their address are
//! free to carry the value tag.
//!
//! Allocation hands back both the tagged word and a raw write-through
//! handle to the record, so constructors can fill the record in after the
//! word exists. Record addresses are stable for the life of the heap, which
//! is what makes bitwise word comparison a sound identity test.
//!
//! # Collection
//!
//! The heap is bump-only: nothing is reclaimed until the whole heap is
//! dropped, and exhausting the configured capacity is fatal. A future
//! collector has everything it needs in the tag layout: cells trace two
//! child slots, vectors trace `count` slots, strings trace one interior
//! child (whose bytes are opaque), streams trace their functions interior,
//! subrs trace their name, and interiors are never scanned. The root set is
//! the per-machine well-known symbols, the active environment chain, and
//! whatever the evaluator holds on the call stack.

use bumpalo::Bump;
use std::alloc::Layout;

use crate::value::{TAG_MASK, Tag, Value};

/// Record alignment. Sixteen bytes keeps the four tag bits clear and suits
/// modern cache behavior.
pub const HEAP_ALIGN: usize = 16;

/// Default heap capacity in bytes.
pub const DEFAULT_HEAP_CAPACITY: usize = 1024 * 1024;

/// A bump-allocated heap with a hard capacity.
pub struct Heap {
    arena: Bump,
    capacity: usize,
}

impl Heap {
    /// Create a heap that will refuse to grow past `capacity` bytes.
    pub fn new(capacity: usize) -> Heap {
        let arena = Bump::new();
        arena.set_allocation_limit(Some(capacity));
        Heap { arena, capacity }
    }

    /// Create a heap with the default capacity.
    pub fn with_default_capacity() -> Heap {
        Heap::new(DEFAULT_HEAP_CAPACITY)
    }

    /// Allocate a record of `size` bytes tagged as `tag`.
    ///
    /// Returns the tagged value and a raw pointer to the (uninitialized)
    /// record for the constructor to fill in. Exhausting the heap is fatal:
    /// there is no collector to run.
    pub fn allocate(&self, tag: Tag, size: usize) -> (Value, *mut u8) {
        let layout =
            Layout::from_size_align(size.max(HEAP_ALIGN), HEAP_ALIGN).expect("record layout overflow");

        let ptr = match self.arena.try_alloc_layout(layout) {
            Ok(ptr) => ptr.as_ptr(),
            Err(_) => panic!(
                "heap exhausted: cannot allocate {size} bytes ({} of {} in use)",
                self.allocated_bytes(),
                self.capacity
            ),
        };

        let address = ptr as usize;
        debug_assert_eq!(address & TAG_MASK, 0, "heap record is misaligned");

        (Value::from_parts(tag, address), ptr)
    }

    /// Bytes currently allocated, including arena bookkeeping.
    pub fn allocated_bytes(&self) -> usize {
        self.arena.allocated_bytes()
    }

    /// The configured capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
