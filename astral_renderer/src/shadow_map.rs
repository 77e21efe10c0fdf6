// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shadow maps packed into a depth texture.
//!
//! A shadow map of dimension `D` is four 1D depth strips of `D` texels, one
//! per side of the light. Every four rows of the backing form one layer of
//! an [`IntervalAllocator`]; a shadow map takes the same `D`-wide interval in
//! each of the four rows of its layer.
//!
//! Shadow maps can be looked up by [`ShadowMapId`], a generational index:
//! once a shadow map is gone, its id never resolves again, even when the
//! slot is reused.

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::{Cell, Ref, RefCell};
use core::fmt::{Debug, Formatter};

use peniko::kurbo::Point;

use astral_alloc::{IntervalAllocator, IntervalId};

use crate::lock::DeferredIntervals;
use crate::{AtlasConfig, AtlasStats, Error, LockResources, ShadowMapBacking};

/// Backing rows per interval allocator layer.
const ROWS_PER_LAYER: u32 = 4;

/// Generational id of a [`ShadowMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShadowMapId {
    slot: u32,
    uniqueness: u32,
}

impl ShadowMapId {
    /// Index into the atlas' id table.
    #[inline]
    pub fn slot(self) -> u32 {
        self.slot
    }

    /// Number of times the slot was retired before this id was issued.
    #[inline]
    pub fn uniqueness(self) -> u32 {
        self.uniqueness
    }
}

/// One of the four depth strips of a shadow map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowMapSide {
    /// Looking towards decreasing x.
    MinX,
    /// Looking towards increasing x.
    MaxX,
    /// Looking towards decreasing y.
    MinY,
    /// Looking towards increasing y.
    MaxY,
}

impl ShadowMapSide {
    /// Every side, in row order.
    pub const ALL: [Self; 4] = [Self::MinX, Self::MaxX, Self::MinY, Self::MaxY];

    fn row(self) -> u32 {
        match self {
            Self::MinX => 0,
            Self::MaxX => 1,
            Self::MinY => 2,
            Self::MaxY => 3,
        }
    }
}

/// What a shadow map needs from its atlas.
trait ShadowMapOwner {
    fn unlock_count(&self) -> u64;
    fn release(&self, id: ShadowMapId, storage: IntervalId);
}

struct Fetcher {
    uniqueness: u32,
    map: Weak<ShadowMapInner>,
}

struct ShadowStore {
    storage: DeferredIntervals,
    /// Id table; `None` for slots on the free list.
    slots: Vec<Option<Fetcher>>,
    free_ids: Vec<ShadowMapId>,
}

impl ShadowStore {
    fn allocate_shadow_map_id(&mut self) -> ShadowMapId {
        if let Some(id) = self.free_ids.pop() {
            return id;
        }
        let Ok(slot) = u32::try_from(self.slots.len()) else {
            panic!("shadow map id table is full");
        };
        self.slots.push(None);
        ShadowMapId {
            slot,
            uniqueness: 0,
        }
    }

    fn free_shadow_map_id(&mut self, id: ShadowMapId) {
        self.slots[id.slot as usize] = None;
        self.free_ids.push(ShadowMapId {
            slot: id.slot,
            uniqueness: id.uniqueness.wrapping_add(1),
        });
    }

}

impl ShadowMapOwner for RefCell<ShadowStore> {
    fn unlock_count(&self) -> u64 {
        self.borrow().storage.lock.unlock_count()
    }

    fn release(&self, id: ShadowMapId, storage: IntervalId) {
        let mut store = self.borrow_mut();
        store.free_shadow_map_id(id);
        store.storage.release(storage);
    }
}

struct ShadowMapInner {
    owner: Rc<dyn ShadowMapOwner>,
    id: ShadowMapId,
    storage: IntervalId,
    x: u32,
    layer: u32,
    dimensions: u32,
    light_position: Point,
    in_use_marker: Cell<u64>,
    offscreen_render_index: Cell<Option<u32>>,
}

impl Drop for ShadowMapInner {
    fn drop(&mut self) {
        self.owner.release(self.id, self.storage);
    }
}

/// A shared handle to a shadow map.
#[derive(Clone)]
pub struct ShadowMap {
    inner: Rc<ShadowMapInner>,
}

impl ShadowMap {
    /// The id to look this shadow map up with.
    #[inline]
    pub fn id(&self) -> ShadowMapId {
        self.inner.id
    }

    /// Length of each of the four depth strips.
    #[inline]
    pub fn dimensions(&self) -> u32 {
        self.inner.dimensions
    }

    /// Position of the light casting the shadow.
    #[inline]
    pub fn light_position(&self) -> Point {
        self.inner.light_position
    }

    /// `(x, y)` of the first texel of the strip for `side` in the backing.
    #[inline]
    pub fn location(&self, side: ShadowMapSide) -> (u32, u32) {
        (
            self.inner.x,
            self.inner.layer * ROWS_PER_LAYER + side.row(),
        )
    }

    /// Index of the offscreen render that fills this shadow map, if scheduled.
    #[inline]
    pub fn offscreen_render_index(&self) -> Option<u32> {
        self.inner.offscreen_render_index.get()
    }

    /// Flag the shadow map as referenced by commands of the current frame.
    pub fn mark_in_use(&self) {
        let count = self.inner.owner.unlock_count();
        self.inner.in_use_marker.set(count + 1);
    }

    /// Whether commands referencing the content may still be pending, that
    /// is, the atlas has not been fully unlocked since [`mark_in_use`](Self::mark_in_use).
    pub fn in_use(&self) -> bool {
        self.inner.in_use_marker.get() > self.inner.owner.unlock_count()
    }
}

impl Debug for ShadowMap {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShadowMap")
            .field("id", &self.inner.id)
            .field("dimensions", &self.inner.dimensions)
            .field("light_position", &self.inner.light_position)
            .field("location", &self.location(ShadowMapSide::MinX))
            .finish_non_exhaustive()
    }
}

/// Atlas of [`ShadowMap`]s in a depth texture that grows in height.
pub struct ShadowMapAtlas<B: ShadowMapBacking> {
    backing: RefCell<B>,
    store: Rc<RefCell<ShadowStore>>,
}

impl<B: ShadowMapBacking> ShadowMapAtlas<B> {
    /// Creates an atlas over `backing` with the default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the backing has zero width.
    pub fn new(backing: B) -> Self {
        Self::with_config(backing, AtlasConfig::default())
    }

    /// Creates an atlas over `backing`.
    ///
    /// # Panics
    ///
    /// Panics if the backing has zero width.
    pub fn with_config(backing: B, config: AtlasConfig) -> Self {
        assert!(backing.width() > 0, "shadow map backing must not be empty");
        let mut intervals =
            IntervalAllocator::new(backing.width(), backing.height() / ROWS_PER_LAYER);
        intervals.set_tracer(config.tracer);
        Self {
            backing: RefCell::new(backing),
            store: Rc::new(RefCell::new(ShadowStore {
                storage: DeferredIntervals::new(intervals),
                slots: Vec::new(),
                free_ids: Vec::new(),
            })),
        }
    }

    /// Reserve a shadow map of `dimensions` texels per side.
    ///
    /// Fails if `dimensions` exceeds the backing width.
    ///
    /// # Panics
    ///
    /// Panics if `dimensions` is zero.
    pub fn create(&self, dimensions: u32, light_position: Point) -> Result<ShadowMap, Error> {
        assert!(dimensions > 0, "shadow maps must have a non-zero dimension");
        let width = self.backing.borrow().width();
        if dimensions > width {
            return Err(Error::shadow_map_too_large(dimensions, width));
        }

        let storage = self.allocate_interval(dimensions);
        let mut store = self.store.borrow_mut();
        let Some(interval) = store.storage.intervals.interval(storage) else {
            unreachable!("freshly allocated interval is live");
        };
        let id = store.allocate_shadow_map_id();
        let inner = Rc::new(ShadowMapInner {
            owner: self.store.clone(),
            id,
            storage,
            x: interval.begin,
            layer: interval.layer,
            dimensions,
            light_position,
            in_use_marker: Cell::new(0),
            offscreen_render_index: Cell::new(None),
        });
        store.slots[id.slot as usize] = Some(Fetcher {
            uniqueness: id.uniqueness,
            map: Rc::downgrade(&inner),
        });

        Ok(ShadowMap { inner })
    }

    /// The live shadow map with `id`, if any.
    pub fn fetch_shadow_map(&self, id: ShadowMapId) -> Option<ShadowMap> {
        let store = self.store.borrow();
        let fetcher = store.slots.get(id.slot as usize)?.as_ref()?;
        if fetcher.uniqueness != id.uniqueness {
            return None;
        }
        fetcher.map.upgrade().map(|inner| ShadowMap { inner })
    }

    /// Record which offscreen render fills `map`.
    ///
    /// # Panics
    ///
    /// Panics if `map` belongs to another atlas.
    pub fn set_offscreen_render_index(&self, map: &ShadowMap, index: Option<u32>) {
        assert!(
            core::ptr::addr_eq(Rc::as_ptr(&map.inner.owner), Rc::as_ptr(&self.store)),
            "shadow map belongs to a different atlas"
        );
        map.inner.offscreen_render_index.set(index);
    }

    /// Number of times the atlas has been fully unlocked.
    pub fn unlock_count(&self) -> u64 {
        self.store.borrow().storage.lock.unlock_count()
    }

    /// The backing store.
    ///
    /// Creating shadow maps while the borrow is held panics; dropping
    /// handles does not.
    pub fn backing(&self) -> Ref<'_, B> {
        self.backing.borrow()
    }

    /// The render target shadow maps are drawn into.
    pub fn render_target(&self) -> Ref<'_, B::RenderTarget> {
        Ref::map(self.backing.borrow(), |backing| backing.render_target())
    }

    /// Current bookkeeping figures.
    pub fn stats(&self) -> AtlasStats {
        let store = self.store.borrow();
        AtlasStats {
            live_allocations: store.storage.intervals.number_live_intervals(),
            delayed_frees: store.storage.lock.number_delayed(),
            lock_depth: store.storage.lock.depth(),
            backing_size: self.backing.borrow().height(),
        }
    }

    fn allocate_interval(&self, dimensions: u32) -> IntervalId {
        let mut store = self.store.borrow_mut();
        if let Some(id) = store.storage.intervals.allocate(dimensions) {
            return id;
        }

        let mut backing = self.backing.borrow_mut();
        let current = backing.height();
        let requested = current + ROWS_PER_LAYER;
        let actual = backing.resize(requested);
        assert!(
            actual >= requested,
            "shadow map backing grew to {actual} rows, {requested} were requested"
        );
        log::debug!("shadow map backing grown from {current} to {actual} rows");
        store.storage.intervals.set_number_layers(actual / ROWS_PER_LAYER);

        let Some(id) = store.storage.intervals.allocate(dimensions) else {
            unreachable!("a {dimensions} wide shadow map must fit in a fresh layer");
        };
        id
    }
}

impl<B: ShadowMapBacking> LockResources for ShadowMapAtlas<B> {
    fn lock_resources(&self) {
        self.store.borrow_mut().storage.lock.lock();
    }

    fn unlock_resources(&self) {
        self.store.borrow_mut().storage.unlock();
    }
}

impl<B: ShadowMapBacking> Debug for ShadowMapAtlas<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let backing = self.backing.borrow();
        f.debug_struct("ShadowMapAtlas")
            .field("width", &backing.width())
            .field("height", &backing.height())
            .field("id_slots", &self.store.borrow().slots.len())
            .finish_non_exhaustive()
    }
}
