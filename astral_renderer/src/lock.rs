// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Deferred freeing of storage while a frame is in flight.
//!
//! Between locking and the final unlock, GPU commands referencing an
//! atlas' storage may still be pending even though the last handle to it is
//! gone. Releases made while locked are queued and applied once the lock
//! depth returns to zero. Locks nest.

use alloc::vec::Vec;
use core::cell::RefCell;

use astral_alloc::{IntervalAllocator, IntervalId};

/// Something whose storage frees must wait for the end of a frame.
///
/// Every atlas implements this; see [`FrameGuard`](crate::FrameGuard) for
/// locking several at once.
pub trait LockResources {
    /// Enter a frame, or nest one level deeper.
    fn lock_resources(&self);

    /// Leave one level; on reaching zero, apply every deferred free.
    ///
    /// # Panics
    ///
    /// Panics if the resources are not locked.
    fn unlock_resources(&self);
}

/// Lock depth plus the releases queued while locked.
#[derive(Debug)]
pub(crate) struct ResourceLock<T> {
    depth: u32,
    delayed_frees: Vec<T>,
    unlock_count: u64,
}

impl<T> ResourceLock<T> {
    pub(crate) fn new() -> Self {
        Self {
            depth: 0,
            delayed_frees: Vec::new(),
            unlock_count: 0,
        }
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.depth > 0
    }

    pub(crate) fn depth(&self) -> u32 {
        self.depth
    }

    /// Number of times the depth has returned to zero.
    pub(crate) fn unlock_count(&self) -> u64 {
        self.unlock_count
    }

    pub(crate) fn number_delayed(&self) -> usize {
        self.delayed_frees.len()
    }

    pub(crate) fn lock(&mut self) {
        self.depth += 1;
    }

    /// Decrease the depth, returning the queued releases if it reached zero.
    pub(crate) fn unlock(&mut self) -> Vec<T> {
        assert!(self.depth > 0, "unlock_resources called without a matching lock");
        self.depth -= 1;
        if self.depth > 0 {
            return Vec::new();
        }
        self.unlock_count += 1;
        let flushed = core::mem::take(&mut self.delayed_frees);
        if !flushed.is_empty() {
            log::trace!("flushing {} delayed frees", flushed.len());
        }
        flushed
    }

    /// Queue `item` if locked, otherwise hand it back to be released now.
    pub(crate) fn defer(&mut self, item: T) -> Option<T> {
        if self.is_locked() {
            log::trace!("resources locked, deferring release");
            self.delayed_frees.push(item);
            None
        } else {
            Some(item)
        }
    }
}

/// An interval allocator whose releases go through a [`ResourceLock`].
#[derive(Debug)]
pub(crate) struct DeferredIntervals {
    pub(crate) intervals: IntervalAllocator,
    pub(crate) lock: ResourceLock<IntervalId>,
}

impl DeferredIntervals {
    pub(crate) fn new(intervals: IntervalAllocator) -> Self {
        Self {
            intervals,
            lock: ResourceLock::new(),
        }
    }

    pub(crate) fn release(&mut self, id: IntervalId) {
        if let Some(id) = self.lock.defer(id) {
            self.intervals.release(id);
        }
    }

    pub(crate) fn unlock(&mut self) {
        for id in self.lock.unlock() {
            self.intervals.release(id);
        }
    }
}

/// The narrow capability a handle holds on its owner: give storage back.
///
/// Owners keep their bookkeeping apart from their backing, so a release
/// never needs the backing and can happen while it is borrowed.
pub(crate) trait ReleaseStorage<K> {
    fn release_storage(&self, key: K);
}

impl ReleaseStorage<IntervalId> for RefCell<DeferredIntervals> {
    fn release_storage(&self, key: IntervalId) {
        self.borrow_mut().release(key);
    }
}
