// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Static data: uniform-like records shaders fetch by offset.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Ref, RefCell};
use core::fmt::{Debug, Formatter};
use core::marker::PhantomData;

use astral_alloc::{IntervalAllocator, IntervalId};

use crate::lock::{DeferredIntervals, ReleaseStorage};
use crate::{
    AtlasConfig, AtlasStats, GVec4, LockResources, StaticDataBacking, StaticDataRecord, U16Vec4,
};

/// Grow a linear allocator to cover `length` records.
///
/// The allocator of an empty backing has no layer yet; it gets one here.
pub(crate) fn extend_linear(intervals: &mut IntervalAllocator, length: u32) {
    intervals.set_layer_length(length);
    intervals.set_number_layers(1);
}

/// A single-layer allocator over a backing of `size` records.
pub(crate) fn linear_intervals(size: u32, config: AtlasConfig) -> DeferredIntervals {
    let mut intervals = IntervalAllocator::new(size.max(1), u32::from(size > 0));
    intervals.set_tracer(config.tracer);
    DeferredIntervals::new(intervals)
}

struct StaticDataInner {
    owner: Rc<dyn ReleaseStorage<IntervalId>>,
    storage: Option<IntervalId>,
    location: u32,
    size: u32,
    streamer: bool,
}

impl Drop for StaticDataInner {
    fn drop(&mut self) {
        if let Some(id) = self.storage {
            self.owner.release_storage(id);
        }
    }
}

/// A shared handle to a range of static data records.
///
/// The records stay reserved until the last clone is dropped, and if the
/// allocator is locked at that point, until it is unlocked.
#[derive(Clone)]
pub struct StaticData {
    inner: Rc<StaticDataInner>,
}

impl StaticData {
    /// Offset of the first record in the backing.
    #[inline]
    pub fn location(&self) -> u32 {
        self.inner.location
    }

    /// Number of records.
    #[inline]
    pub fn size(&self) -> u32 {
        self.inner.size
    }

    /// Whether the content is supplied after creation.
    #[inline]
    pub fn is_streamer(&self) -> bool {
        self.inner.streamer
    }
}

impl Debug for StaticData {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StaticData")
            .field("location", &self.inner.location)
            .field("size", &self.inner.size)
            .field("streamer", &self.inner.streamer)
            .finish_non_exhaustive()
    }
}

/// Allocator of [`StaticData`] from a growable linear backing.
///
/// The record type `R` is the backing's
/// [`Record`](StaticDataBacking::Record); see [`StaticDataAllocator32`]
/// and [`StaticDataAllocator16`].
pub struct StaticDataAllocatorCommon<R, B>
where
    R: StaticDataRecord,
    B: StaticDataBacking<Record = R>,
{
    backing: RefCell<B>,
    store: Rc<RefCell<DeferredIntervals>>,
    record: PhantomData<fn() -> R>,
}

/// A [`StaticDataAllocatorCommon`] over a backing of [`GVec4`] records.
pub type StaticDataAllocator32<B> = StaticDataAllocatorCommon<GVec4, B>;

/// A [`StaticDataAllocatorCommon`] over a backing of [`U16Vec4`] records.
///
/// A backing of any other record does not fit:
///
/// ```compile_fail
/// use astral_renderer::{GVec4, StaticDataAllocator16, StaticDataBacking};
///
/// struct Wide(Vec<GVec4>);
///
/// impl StaticDataBacking for Wide {
///     type Record = GVec4;
///     fn size(&self) -> u32 { 1 }
///     fn resize(&mut self, new_size: u32) -> u32 { new_size }
///     fn set_data(&mut self, _offset: u32, _records: &[GVec4]) {}
/// }
///
/// fn narrow(_statics: StaticDataAllocator16<Wide>) {}
/// ```
pub type StaticDataAllocator16<B> = StaticDataAllocatorCommon<U16Vec4, B>;

impl<R, B> StaticDataAllocatorCommon<R, B>
where
    R: StaticDataRecord,
    B: StaticDataBacking<Record = R>,
{
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
            record: PhantomData,
        }
    }

    /// Store `data`, uploading it right away.
    pub fn create(&self, data: &[R]) -> StaticData {
        let handle = self.reserve(record_count(data.len()), false);
        if !data.is_empty() {
            self.backing.borrow_mut().set_data(handle.location(), data);
        }
        handle
    }

    /// Reserve `size` records whose content is supplied later with
    /// [`set_values_for_streaming`](Self::set_values_for_streaming).
    pub fn create_streamer(&self, size: u32) -> StaticData {
        self.reserve(size, true)
    }

    /// Write `values` to the start of `data`.
    ///
    /// # Panics
    ///
    /// Panics if `data` came from another allocator or holds fewer than
    /// `values.len()` records.
    pub fn set_values_for_streaming(&self, data: &StaticData, values: &[R]) {
        assert!(
            core::ptr::addr_eq(Rc::as_ptr(&data.inner.owner), Rc::as_ptr(&self.store)),
            "static data streamed through an allocator that does not own it"
        );
        assert!(
            values.len() <= data.size() as usize,
            "streamed {} records into static data holding {}",
            values.len(),
            data.size()
        );
        if !values.is_empty() {
            self.backing.borrow_mut().set_data(data.location(), values);
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

    /// Reserve `size` records, growing the backing if needed.
    fn allocate_data(&self, size: u32) -> IntervalId {
        let mut store = self.store.borrow_mut();
        if let Some(id) = store.intervals.allocate(size) {
            return id;
        }

        let mut backing = self.backing.borrow_mut();
        let current = backing.size();
        let requested = current.saturating_mul(2).max(current.saturating_add(size));
        let actual = backing.resize(requested);
        assert!(
            actual >= requested,
            "static data backing grew to {actual} records, {requested} were requested"
        );
        log::debug!("static data backing grown from {current} to {actual} records");
        extend_linear(&mut store.intervals, actual);

        let Some(id) = store.intervals.allocate(size) else {
            unreachable!("{size} records must fit after growing the backing to {actual}");
        };
        id
    }

    fn reserve(&self, size: u32, streamer: bool) -> StaticData {
        let storage = (size > 0).then(|| self.allocate_data(size));
        let location = storage
            .and_then(|id| self.store.borrow().intervals.interval(id))
            .map_or(0, |interval| interval.begin);

        StaticData {
            inner: Rc::new(StaticDataInner {
                owner: self.store.clone(),
                storage,
                location,
                size,
                streamer,
            }),
        }
    }
}

impl<B: StaticDataBacking<Record = GVec4>> StaticDataAllocator32<B> {
    /// Store floats as 32-bit records.
    pub fn create_from_f32(&self, values: &[[f32; 4]]) -> StaticData {
        let records: Vec<GVec4> = values.iter().map(|v| GVec4::from_f32(*v)).collect();
        self.create(&records)
    }

    /// Store unsigned integers as 32-bit records.
    pub fn create_from_u32(&self, values: &[[u32; 4]]) -> StaticData {
        let records: Vec<GVec4> = values.iter().map(|v| GVec4::from_u32(*v)).collect();
        self.create(&records)
    }
}

impl<B: StaticDataBacking<Record = U16Vec4>> StaticDataAllocator16<B> {
    /// Store floats as half-precision 16-bit records.
    pub fn create_from_f32_lossy(&self, values: &[[f32; 4]]) -> StaticData {
        let records: Vec<U16Vec4> = values.iter().map(|v| U16Vec4::from_f32(*v)).collect();
        self.create(&records)
    }

    /// Store pairs of 32-bit words as 16-bit records.
    pub fn create_from_u32vec2(&self, values: &[[u32; 2]]) -> StaticData {
        let records: Vec<U16Vec4> = values.iter().map(|v| U16Vec4::from_u32vec2(*v)).collect();
        self.create(&records)
    }
}

impl<R, B> LockResources for StaticDataAllocatorCommon<R, B>
where
    R: StaticDataRecord,
    B: StaticDataBacking<Record = R>,
{
    fn lock_resources(&self) {
        self.store.borrow_mut().lock.lock();
    }

    fn unlock_resources(&self) {
        self.store.borrow_mut().unlock();
    }
}

impl<R, B> Debug for StaticDataAllocatorCommon<R, B>
where
    R: StaticDataRecord,
    B: StaticDataBacking<Record = R>,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StaticDataAllocatorCommon")
            .field("size", &self.backing.borrow().size())
            .field("intervals", &self.store.borrow().intervals)
            .finish_non_exhaustive()
    }
}

pub(crate) fn record_count(len: usize) -> u32 {
    let Ok(count) = u32::try_from(len) else {
        panic!("{len} elements exceed the addressable size of a backing");
    };
    count
}
