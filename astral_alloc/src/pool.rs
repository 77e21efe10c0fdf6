// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Index-based object pool.
//!
//! The allocators in this crate keep their bookkeeping nodes (interval nodes,
//! tiles, packed rectangles) in an [`ObjectPool`] rather than in individually
//! boxed objects. Released slots are threaded onto a free list and handed out
//! again by later allocations, so steady-state allocation never touches the
//! global heap.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};
use core::ops;

use crate::AllocationTracer;

/// A (potentially stale) index of an object in an [`ObjectPool`].
///
/// The pointer carries no information about which pool it belongs to, nor
/// whether the slot has since been recycled. Callers that need stale-pointer
/// detection store a serial number alongside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolPtr(usize);

impl PoolPtr {
    /// The slot index within the pool.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

enum Entry<T> {
    Used(T),
    /// Free slot; points at the next free slot.
    Free(Option<usize>),
}

/// Non-thread-safe object pool with slot recycling.
pub struct ObjectPool<T> {
    storage: Vec<Entry<T>>,
    first_free: Option<usize>,
    live: usize,
    label: &'static str,
    tracer: Option<Rc<dyn AllocationTracer>>,
}

impl<T> ObjectPool<T> {
    /// Creates an empty pool. `label` identifies the pool to a tracer.
    pub fn new(label: &'static str) -> Self {
        Self {
            storage: Vec::new(),
            first_free: None,
            live: 0,
            label,
            tracer: None,
        }
    }

    /// Attach (or detach, with `None`) an allocation tracer.
    pub fn set_tracer(&mut self, tracer: Option<Rc<dyn AllocationTracer>>) {
        self.tracer = tracer;
    }

    /// The label given at construction.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Store `value` in a free slot, growing the storage if none is free.
    pub fn allocate(&mut self, value: T) -> PoolPtr {
        let index = match self.first_free {
            Some(i) => {
                let Entry::Free(next) = self.storage[i] else {
                    unreachable!("pool free list points at a used slot");
                };
                self.first_free = next;
                self.storage[i] = Entry::Used(value);
                i
            }
            None => {
                self.storage.push(Entry::Used(value));
                self.storage.len() - 1
            }
        };
        self.live += 1;
        if let Some(tracer) = &self.tracer {
            tracer.on_allocate(self.label, self.live);
        }
        PoolPtr(index)
    }

    /// Remove the object at `ptr`, returning it, or `None` if the slot is
    /// already free or out of range.
    pub fn deallocate(&mut self, ptr: PoolPtr) -> Option<T> {
        let entry = self.storage.get_mut(ptr.0)?;
        if let Entry::Free(_) = entry {
            return None;
        }
        let Entry::Used(value) = core::mem::replace(entry, Entry::Free(self.first_free)) else {
            unreachable!();
        };
        self.first_free = Some(ptr.0);
        self.live -= 1;
        if let Some(tracer) = &self.tracer {
            tracer.on_deallocate(self.label, self.live);
        }
        Some(value)
    }

    /// Borrow the object at `ptr`, if the slot is in use.
    #[inline]
    pub fn get(&self, ptr: PoolPtr) -> Option<&T> {
        match self.storage.get(ptr.0)? {
            Entry::Used(value) => Some(value),
            Entry::Free(_) => None,
        }
    }

    /// Mutably borrow the object at `ptr`, if the slot is in use.
    #[inline]
    pub fn get_mut(&mut self, ptr: PoolPtr) -> Option<&mut T> {
        match self.storage.get_mut(ptr.0)? {
            Entry::Used(value) => Some(value),
            Entry::Free(_) => None,
        }
    }

    /// Number of live objects.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether the pool holds no live objects.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Number of slots, used or free.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Drop every live object. Outstanding pointers become dangling.
    pub fn clear(&mut self) {
        self.storage.clear();
        self.first_free = None;
        self.live = 0;
    }

    /// Iterate over the live objects and their pointers, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (PoolPtr, &T)> {
        self.storage
            .iter()
            .enumerate()
            .filter_map(|(i, e)| match e {
                Entry::Used(value) => Some((PoolPtr(i), value)),
                Entry::Free(_) => None,
            })
    }
}

impl<T> ops::Index<PoolPtr> for ObjectPool<T> {
    type Output = T;

    #[inline]
    fn index(&self, ptr: PoolPtr) -> &T {
        self.get(ptr).expect("dangling PoolPtr")
    }
}

impl<T> ops::IndexMut<PoolPtr> for ObjectPool<T> {
    #[inline]
    fn index_mut(&mut self, ptr: PoolPtr) -> &mut T {
        self.get_mut(ptr).expect("dangling PoolPtr")
    }
}

impl<T> Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObjectPool")
            .field("label", &self.label)
            .field("live", &self.live)
            .field("capacity", &self.storage.len())
            .finish_non_exhaustive()
    }
}
