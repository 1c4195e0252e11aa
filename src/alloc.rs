//! Collision-free identifier allocation.
//!
//! Identifiers handed out by one call must not clash with the null marker,
//! with Sofa identifiers that are already committed to storage, or with each
//! other. The allocator walks upwards from the caller's next free identifier
//! and skips everything reserved.

use std::collections::HashSet;

use crate::graph::XmiId;

/// Identifier of the null marker record.
pub const NULL_ID: XmiId = 0;

/// Per-call identifier allocator.
///
/// Produces monotonically increasing identifiers starting from the given
/// counter, never returning a reserved one twice.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: XmiId,
    reserved: HashSet<XmiId>,
}

impl IdAllocator {
    /// Create an allocator resuming from `next_free_id`.
    ///
    /// The null marker identifier is reserved from the start.
    pub fn starting_from(next_free_id: XmiId) -> Self {
        Self {
            next: next_free_id,
            reserved: HashSet::from([NULL_ID]),
        }
    }

    /// Mark an identifier as taken. Returns `false` if it already was.
    pub fn reserve(&mut self, id: XmiId) -> bool {
        self.reserved.insert(id)
    }

    pub fn is_reserved(&self, id: XmiId) -> bool {
        self.reserved.contains(&id)
    }

    /// Hand out the next free identifier and reserve it.
    pub fn allocate(&mut self) -> XmiId {
        while self.reserved.contains(&self.next) {
            self.next += 1;
        }
        let id = self.next;
        self.reserved.insert(id);
        self.next += 1;
        id
    }

    /// The counter the caller should persist for the next call.
    pub fn next_free(&self) -> XmiId {
        self.next
    }
}
