//! Generational handle pool.
//!
//! A free-list over `u32` indices, extended with the generation + dense
//! storage spec §4.1 asks for: every mesh, material, texture, camera,
//! light, and scene node is addressable from the GPU by a stable `(index,
//! generation)` pair that defeats use-after-free without giving up
//! cache-friendly bulk iteration.

use std::marker::PhantomData;

/// A generational handle into a [`Pool<T>`].
///
/// `generation` starts at 1 the first time a slot is allocated; 0 is
/// reserved to mean "never allocated" and is never handed out by
/// [`Pool::alloc`]. Freeing a slot increments its generation (skipping 0 on
/// wrap), which invalidates every handle obtained before the free.
pub struct Handle<T> {
    pub index: u32,
    pub generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation, _marker: PhantomData }
    }

    /// The null handle: never resolves in any pool (generation 0 never
    /// matches an active slot).
    pub const fn null() -> Self {
        Self { index: 0, generation: 0, _marker: PhantomData }
    }

    pub fn is_null(&self) -> bool {
        self.generation == 0
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self { *self }
}
impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}
impl<T> Eq for Handle<T> {}

impl<T> std::hash::Hash for Handle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Handle(index={}, generation={})", self.index, self.generation)
    }
}

struct Entry<T> {
    generation: u32,
    active: bool,
    item: T,
}

/// Dense, append-only generational pool.
///
/// Invariant (spec §3): `count(active entries) = len(entries) - len(free_indices)`.
pub struct Pool<T> {
    entries: Vec<Entry<T>>,
    free_indices: Vec<u32>,
    capacity: Option<u32>,
}

impl<T: Default> Pool<T> {
    pub fn new() -> Self {
        Self { entries: Vec::new(), free_indices: Vec::new(), capacity: None }
    }

    pub fn with_capacity(capacity: u32) -> Self {
        Self { entries: Vec::new(), free_indices: Vec::new(), capacity: Some(capacity) }
    }

    /// Allocate a slot, reactivating a freed one if available.
    ///
    /// Returns `None` only when a capacity cap is set and would be
    /// exceeded; callers that map this to spec's `CapacityExceeded` choose
    /// warn-and-drop or hard failure per resource kind (§7).
    pub fn alloc(&mut self) -> Option<(Handle<T>, &mut T)> {
        if let Some(index) = self.free_indices.pop() {
            let entry = &mut self.entries[index as usize];
            entry.active = true;
            entry.item = T::default();
            let handle = Handle::new(index, entry.generation);
            return Some((handle, &mut entry.item));
        }

        if let Some(cap) = self.capacity {
            if self.entries.len() as u32 >= cap {
                return None;
            }
        }

        let index = self.entries.len() as u32;
        self.entries.push(Entry { generation: 1, active: true, item: T::default() });
        let entry = self.entries.last_mut().unwrap();
        Some((Handle::new(index, entry.generation), &mut entry.item))
    }

    /// Release a slot back to the free list.
    ///
    /// No-op (returns `None`) for a stale or out-of-range handle. On
    /// success, returns a mutable borrow of the item *before* it is
    /// recycled so the caller can release any GPU resources it owns, plus
    /// whether the slot was actually freed (always `true` on `Some`, kept
    /// for symmetry with spec §4.1's described return shape).
    pub fn free(&mut self, handle: Handle<T>) -> Option<(&mut T, bool)> {
        let entry = self.entries.get_mut(handle.index as usize)?;
        if !entry.active || entry.generation != handle.generation {
            return None;
        }

        entry.active = false;
        entry.generation = if entry.generation == u32::MAX { 1 } else { entry.generation + 1 };
        if entry.generation == 0 {
            entry.generation = 1;
        }
        self.free_indices.push(handle.index);
        Some((&mut entry.item, true))
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        let entry = self.entries.get(handle.index as usize)?;
        if entry.active && entry.generation == handle.generation {
            Some(&entry.item)
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        let entry = self.entries.get_mut(handle.index as usize)?;
        if entry.active && entry.generation == handle.generation {
            Some(&mut entry.item)
        } else {
            None
        }
    }

    pub fn is_valid(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Number of currently active entries.
    pub fn active_count(&self) -> usize {
        self.entries.len() - self.free_indices.len()
    }

    /// Total dense storage length (active + freed-but-reserved slots).
    pub fn capacity_used(&self) -> usize {
        self.entries.len()
    }

    /// Iterate active `(Handle, &T)` pairs in dense storage order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.entries.iter().enumerate().filter_map(|(i, e)| {
            e.active.then(|| (Handle::new(i as u32, e.generation), &e.item))
        })
    }

    /// Iterate active `(Handle, &mut T)` pairs in dense storage order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.entries.iter_mut().enumerate().filter_map(|(i, e)| {
            if e.active {
                Some((Handle::new(i as u32, e.generation), &mut e.item))
            } else {
                None
            }
        })
    }
}

impl<T: Default> Default for Pool<T> {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
