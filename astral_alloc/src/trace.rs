// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Allocation tracing hooks.

/// Observer notified when pooled bookkeeping objects are created or destroyed.
///
/// A tracer is attached to an individual pool or allocator (see
/// [`ObjectPool::set_tracer`](crate::ObjectPool::set_tracer)) instead of being
/// installed process-wide, so independent allocators never observe each
/// other's activity.
///
/// Both methods default to doing nothing.
pub trait AllocationTracer {
    /// An object labelled `label` was allocated; `live` is the number of live
    /// objects in that pool afterwards.
    fn on_allocate(&self, label: &'static str, live: usize) {
        let _ = (label, live);
    }

    /// An object labelled `label` was released; `live` is the number of live
    /// objects in that pool afterwards.
    fn on_deallocate(&self, label: &'static str, live: usize) {
        let _ = (label, live);
    }
}
