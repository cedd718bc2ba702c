//! Multi-class slab allocator for the bone-matrix store (spec §4.2).
//!
//! A free-list idiom widened from a single implicit size class to the
//! up-to-8 size classes spec §3 describes. Each class owns a disjoint,
//! contiguous `u32` offset range into a single virtual arena; `alloc` and
//! `free` never move bytes, they only move offsets between a class's free
//! list and the caller.

/// One size class: `block_count` blocks of `block_size` slots each.
#[derive(Debug, Clone, Copy)]
pub struct SizeClass {
    pub block_size: u32,
    pub block_count: u32,
}

struct ClassState {
    config: SizeClass,
    /// First offset owned by this class within the virtual arena.
    base: u32,
    free_list: Vec<u32>,
}

/// Up to 8 size classes over a single virtual arena of
/// `sum(block_size * block_count)` slots.
pub struct SlabAllocator {
    classes: Vec<ClassState>,
}

impl SlabAllocator {
    pub const MAX_CLASSES: usize = 8;

    /// `classes` must be sorted ascending by `block_size`; each class's
    /// free list is seeded with `block_count` offsets spaced by
    /// `block_size`, shifted by the cumulative base of earlier classes.
    pub fn new(classes: &[SizeClass]) -> Self {
        assert!(classes.len() <= Self::MAX_CLASSES, "slab allocator supports at most 8 size classes");
        assert!(
            classes.windows(2).all(|w| w[0].block_size <= w[1].block_size),
            "size classes must be sorted ascending by block_size"
        );

        let mut built = Vec::with_capacity(classes.len());
        let mut base = 0u32;
        for &config in classes {
            let mut free_list = Vec::with_capacity(config.block_count as usize);
            for i in (0..config.block_count).rev() {
                free_list.push(base + i * config.block_size);
            }
            built.push(ClassState { config, base, free_list });
            base += config.block_size * config.block_count;
        }

        Self { classes: built }
    }

    /// Total capacity of the virtual arena, in slots.
    pub fn capacity(&self) -> u32 {
        self.classes.iter().map(|c| c.config.block_size * c.config.block_count).sum()
    }

    /// Allocate a block able to hold at least `n` slots.
    ///
    /// Linear scan for the first (smallest, since classes are sorted
    /// ascending) class whose `block_size >= n` with a free block.
    /// Returns `None` on exhaustion — spec's "Failure returns NONE".
    pub fn alloc(&mut self, n: u32) -> Option<u32> {
        for class in &mut self.classes {
            if class.config.block_size >= n {
                if let Some(offset) = class.free_list.pop() {
                    return Some(offset);
                }
            }
        }
        None
    }

    /// Return a previously allocated offset to its class's free list.
    ///
    /// The allocator never coalesces; fragmentation is bounded purely by
    /// the size-class configuration chosen at construction.
    pub fn free(&mut self, offset: u32) {
        if let Some(class) = self.class_for_offset(offset) {
            class.free_list.push(offset);
        }
    }

    /// Locate the class owning `offset` by arithmetic on class base ranges
    /// (binary-searchable since bases are monotonically increasing).
    fn class_for_offset(&mut self, offset: u32) -> Option<&mut ClassState> {
        self.classes.iter_mut().find(|c| {
            let extent = c.config.block_size * c.config.block_count;
            offset >= c.base && offset < c.base + extent
        })
    }

    /// Bytes currently allocated across all classes (§8 slab conservation
    /// invariant): `sum(block_size * (block_count - free_list.len()))`.
    pub fn allocated_slots(&self) -> u32 {
        self.classes
            .iter()
            .map(|c| c.config.block_size * (c.config.block_count - c.free_list.len() as u32))
            .sum()
    }

    /// Whether the device's reported max storage-buffer range can hold this
    /// slab's full capacity for `element_size`-byte elements (spec §9 open
    /// question on the bone slab's aspirational character count).
    pub fn fits_within(&self, max_storage_buffer_range: u64, element_size: u64) -> bool {
        (self.capacity() as u64) * element_size <= max_storage_buffer_range
    }
}

#[cfg(test)]
#[path = "slab_tests.rs"]
mod tests;
