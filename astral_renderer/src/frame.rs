// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::fmt::{Debug, Formatter};

use smallvec::SmallVec;

use crate::LockResources;

/// Keeps a set of atlases locked for the duration of a frame.
///
/// [`begin`](Self::begin) locks every atlas; dropping the guard (or calling
/// [`end`](Self::end)) unlocks them in reverse order, applying the frees
/// deferred during the frame.
///
/// ```
/// use astral_renderer::{FrameGuard, LockResources};
/// # struct Counter(core::cell::Cell<i32>);
/// # impl LockResources for Counter {
/// #     fn lock_resources(&self) { self.0.set(self.0.get() + 1); }
/// #     fn unlock_resources(&self) { self.0.set(self.0.get() - 1); }
/// # }
/// let gradients = Counter(core::cell::Cell::new(0));
/// let frame = FrameGuard::begin(&[&gradients]);
/// assert_eq!(gradients.0.get(), 1);
/// frame.end();
/// assert_eq!(gradients.0.get(), 0);
/// ```
pub struct FrameGuard<'a> {
    resources: SmallVec<[&'a dyn LockResources; 8]>,
}

impl<'a> FrameGuard<'a> {
    /// Lock every atlas in `resources`.
    pub fn begin(resources: &[&'a dyn LockResources]) -> Self {
        for resource in resources {
            resource.lock_resources();
        }
        Self {
            resources: resources.iter().copied().collect(),
        }
    }

    /// Unlock every atlas.
    pub fn end(self) {}
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        for resource in self.resources.iter().rev() {
            resource.unlock_resources();
        }
    }
}

impl Debug for FrameGuard<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameGuard")
            .field("resources", &self.resources.len())
            .finish()
    }
}
