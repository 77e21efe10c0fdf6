// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vertex storage.
//!
//! Index buffers are not kept: indexed geometry is expanded into a flat
//! vertex list on creation.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Ref, RefCell};
use core::fmt::{Debug, Formatter};

use astral_alloc::IntervalId;

use crate::lock::{DeferredIntervals, ReleaseStorage};
use crate::static_data::{extend_linear, linear_intervals, record_count};
use crate::{AtlasConfig, AtlasStats, LockResources, Vertex, VertexBacking};

struct VertexDataInner {
    owner: Rc<dyn ReleaseStorage<IntervalId>>,
    storage: Option<IntervalId>,
    offset: u32,
    number_vertices: u32,
}

impl Drop for VertexDataInner {
    fn drop(&mut self) {
        if let Some(id) = self.storage {
            self.owner.release_storage(id);
        }
    }
}

/// A shared handle to a range of vertices.
#[derive(Clone)]
pub struct VertexData {
    inner: Rc<VertexDataInner>,
}

impl VertexData {
    /// Index of the first vertex in the backing.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.inner.offset
    }

    /// Number of vertices.
    #[inline]
    pub fn number_vertices(&self) -> u32 {
        self.inner.number_vertices
    }
}

impl Debug for VertexData {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VertexData")
            .field("offset", &self.inner.offset)
            .field("number_vertices", &self.inner.number_vertices)
            .finish_non_exhaustive()
    }
}

/// Allocator of [`VertexData`] from a growable vertex buffer.
pub struct VertexDataAllocator<B: VertexBacking> {
    backing: RefCell<B>,
    store: Rc<RefCell<DeferredIntervals>>,
    /// Scratch space for expanding indexed vertices.
    tmp_verts: RefCell<Vec<Vertex>>,
}

impl<B: VertexBacking> VertexDataAllocator<B> {
    /// Creates an allocator over `backing` with the default configuration.
    pub fn new(backing: B) -> Self {
        Self::with_config(backing, AtlasConfig::default())
    }

    /// Creates an allocator over `backing`, which may start empty.
    pub fn with_config(backing: B, config: AtlasConfig) -> Self {
        let store = linear_intervals(backing.size(), config);
        Self {
            backing: RefCell::new(backing),
            store: Rc::new(RefCell::new(store)),
            tmp_verts: RefCell::new(Vec::new()),
        }
    }

    /// Store `vertices`, uploading them right away.
    pub fn create(&self, vertices: &[Vertex]) -> VertexData {
        let handle = self.reserve(record_count(vertices.len()));
        if !vertices.is_empty() {
            self.backing.borrow_mut().set_data(handle.offset(), vertices);
        }
        handle
    }

    /// Store `vertices[indices[i]]` for every index, in order.
    ///
    /// # Panics
    ///
    /// Panics if an index is out of bounds.
    pub fn create_indexed(&self, vertices: &[Vertex], indices: &[u32]) -> VertexData {
        let mut expanded = self.tmp_verts.take();
        expanded.clear();
        expanded.extend(indices.iter().map(|&index| vertices[index as usize]));
        let handle = self.create(&expanded);
        self.tmp_verts.replace(expanded);
        handle
    }

    /// Reserve `number_vertices` vertices whose content is supplied later with
    /// [`set_values_for_streaming`](Self::set_values_for_streaming).
    pub fn create_streamer(&self, number_vertices: u32) -> VertexData {
        self.reserve(number_vertices)
    }

    /// Write `vertices` to the start of `data`.
    ///
    /// # Panics
    ///
    /// Panics if `data` came from another allocator or holds fewer than
    /// `vertices.len()` vertices.
    pub fn set_values_for_streaming(&self, data: &VertexData, vertices: &[Vertex]) {
        assert!(
            core::ptr::addr_eq(Rc::as_ptr(&data.inner.owner), Rc::as_ptr(&self.store)),
            "vertex data streamed through an allocator that does not own it"
        );
        assert!(
            vertices.len() <= data.number_vertices() as usize,
            "streamed {} vertices into vertex data holding {}",
            vertices.len(),
            data.number_vertices()
        );
        if !vertices.is_empty() {
            self.backing.borrow_mut().set_data(data.offset(), vertices);
        }
    }

    /// The backing store.
    ///
    /// Creating data while the borrow is held panics; dropping handles does not.
    pub fn backing(&self) -> Ref<'_, B> {
        self.backing.borrow()
    }

    /// Current bookkeeping figures.
    pub fn stats(&self) -> AtlasStats {
        let store = self.store.borrow();
        AtlasStats {
            live_allocations: store.intervals.number_live_intervals(),
            delayed_frees: store.lock.number_delayed(),
            lock_depth: store.lock.depth(),
            backing_size: self.backing.borrow().size(),
        }
    }

    fn allocate_vertices(&self, count: u32) -> IntervalId {
        let mut store = self.store.borrow_mut();
        if let Some(id) = store.intervals.allocate(count) {
            return id;
        }

        let mut backing = self.backing.borrow_mut();
        let current = backing.size();
        let requested = current.saturating_mul(2).saturating_add(count);
        let actual = backing.resize(requested);
        assert!(
            actual >= requested,
            "vertex backing grew to {actual} vertices, {requested} were requested"
        );
        log::debug!("vertex backing grown from {current} to {actual} vertices");
        extend_linear(&mut store.intervals, actual);

        let Some(id) = store.intervals.allocate(count) else {
            unreachable!("{count} vertices must fit after growing the backing to {actual}");
        };
        id
    }

    fn reserve(&self, number_vertices: u32) -> VertexData {
        let storage = (number_vertices > 0).then(|| self.allocate_vertices(number_vertices));
        let offset = storage
            .and_then(|id| self.store.borrow().intervals.interval(id))
            .map_or(0, |interval| interval.begin);

        VertexData {
            inner: Rc::new(VertexDataInner {
                owner: self.store.clone(),
                storage,
                offset,
                number_vertices,
            }),
        }
    }
}

impl<B: VertexBacking> LockResources for VertexDataAllocator<B> {
    fn lock_resources(&self) {
        self.store.borrow_mut().lock.lock();
    }

    fn unlock_resources(&self) {
        self.store.borrow_mut().unlock();
    }
}

impl<B: VertexBacking> Debug for VertexDataAllocator<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VertexDataAllocator")
            .field("size", &self.backing.borrow().size())
            .field("intervals", &self.store.borrow().intervals)
            .finish_non_exhaustive()
    }
}
