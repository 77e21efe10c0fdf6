// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Gradient color stops rasterized into rows of an array texture.
//!
//! A color stop sequence is a piecewise-linear function of `t` in `[0, 1]`.
//! It is sampled at evenly spaced texels and stored in one layer of the
//! backing, so a gradient shader only has to look up a single texel row.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Ref, RefCell};
use core::fmt::{Debug, Formatter};

#[cfg(feature = "libm")]
#[allow(unused_imports, reason = "only needed when `std` is disabled")]
use core_maths::CoreFloat;
use peniko::color::{ColorSpaceTag, Rgba8};
use peniko::{ColorStop, ColorStops, ColorStopsSource};

use astral_alloc::{IntervalAllocator, IntervalId};

use crate::lock::{DeferredIntervals, ReleaseStorage};
use crate::static_data::record_count;
use crate::{AtlasConfig, AtlasStats, ColorStopBacking, Error, LockResources};

/// Intervals between stops shorter than this are hard stops.
const TINY_T: f32 = 1e-6;

/// A stop with its position normalized and its color in the target space.
#[derive(Debug, Clone, Copy)]
struct Stop {
    t: f32,
    color: [f32; 4],
}

/// Sample `stops`, converted to `colorspace`, into texels.
///
/// Offsets are clamped to `[0, 1]`, with NaN taken as 0, and then sorted.
/// `num_texels == 0` picks the count from the smallest gap between stops,
/// bounded by `min_estimated`, `max_estimated` and `layer_width`.
/// Returns the texels and whether every stop is opaque.
pub(crate) fn discretize(
    stops: &[ColorStop],
    colorspace: ColorSpaceTag,
    num_texels: u32,
    layer_width: u32,
    min_estimated: u32,
    max_estimated: u32,
) -> Result<(Vec<[f32; 4]>, bool), Error> {
    if stops.is_empty() {
        return Err(Error::no_color_stops());
    }
    if num_texels > layer_width {
        return Err(Error::too_many_texels(num_texels, layer_width));
    }

    let mut sorted: Vec<Stop> = stops
        .iter()
        .map(|stop| Stop {
            t: if stop.offset.is_nan() {
                0.0
            } else {
                stop.offset.clamp(0.0, 1.0)
            },
            color: stop.color.convert(colorspace).components,
        })
        .collect();
    sorted.sort_by(|a, b| a.t.total_cmp(&b.t));
    let opaque = sorted.iter().all(|stop| stop.color[3] >= 1.0);

    let n = if num_texels == 0 {
        estimate_texels(&sorted, layer_width, min_estimated, max_estimated)
    } else {
        num_texels
    };
    let n = n.max(1) as usize;
    let sample = |i: usize| {
        if n == 1 {
            0.0
        } else {
            i as f32 / (n - 1) as f32
        }
    };

    let mut texels = Vec::with_capacity(n);
    let first = sorted[0];
    let last = sorted[sorted.len() - 1];

    while texels.len() < n && sample(texels.len()) < first.t {
        texels.push(first.color);
    }
    for pair in sorted.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let ds = to.t - from.t;
        if ds < TINY_T {
            continue;
        }
        while texels.len() < n && sample(texels.len()) <= to.t {
            let s = ((sample(texels.len()) - from.t) / ds).clamp(0.0, 1.0);
            texels.push(lerp(from.color, to.color, s));
        }
    }
    texels.resize(n, last.color);

    Ok((texels, opaque))
}

fn estimate_texels(
    sorted: &[Stop],
    layer_width: u32,
    min_estimated: u32,
    max_estimated: u32,
) -> u32 {
    let ceiling = max_estimated.min(layer_width);
    let min_gap = sorted
        .windows(2)
        .map(|pair| pair[1].t - pair[0].t)
        .filter(|gap| *gap >= TINY_T)
        .min_by(f32::total_cmp);
    match min_gap {
        Some(gap) => {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "gaps are at least TINY_T, so the quotient is at most 1e6"
            )]
            let wanted = (1.0 / gap).ceil() as u32;
            wanted.max(min_estimated).min(ceiling)
        }
        None => min_estimated.min(layer_width),
    }
}

fn lerp(a: [f32; 4], b: [f32; 4], s: f32) -> [f32; 4] {
    core::array::from_fn(|c| a[c] + (b[c] - a[c]) * s)
}

fn to_rgba8(color: [f32; 4]) -> Rgba8 {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "the value is clamped to [0, 255] before the cast"
    )]
    let unorm = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgba8 {
        r: unorm(color[0]),
        g: unorm(color[1]),
        b: unorm(color[2]),
        a: unorm(color[3]),
    }
}

struct ColorStopSequenceInner {
    owner: Rc<dyn ReleaseStorage<IntervalId>>,
    storage: IntervalId,
    layer: u32,
    start: u32,
    num_texels: u32,
    opaque: bool,
    colorspace: ColorSpaceTag,
}

impl Drop for ColorStopSequenceInner {
    fn drop(&mut self) {
        self.owner.release_storage(self.storage);
    }
}

/// A shared handle to a discretized color stop sequence.
#[derive(Clone)]
pub struct ColorStopSequence {
    inner: Rc<ColorStopSequenceInner>,
}

impl ColorStopSequence {
    /// Layer of the backing holding the texels.
    #[inline]
    pub fn layer(&self) -> u32 {
        self.inner.layer
    }

    /// Texel where the sequence starts within its layer.
    #[inline]
    pub fn start(&self) -> u32 {
        self.inner.start
    }

    /// Number of texels.
    #[inline]
    pub fn num_texels(&self) -> u32 {
        self.inner.num_texels
    }

    /// Whether every stop is fully opaque.
    #[inline]
    pub fn opaque(&self) -> bool {
        self.inner.opaque
    }

    /// The color space the texels are stored in: sRGB or linear sRGB.
    #[inline]
    pub fn colorspace(&self) -> ColorSpaceTag {
        self.inner.colorspace
    }
}

impl Debug for ColorStopSequence {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ColorStopSequence")
            .field("layer", &self.inner.layer)
            .field("start", &self.inner.start)
            .field("num_texels", &self.inner.num_texels)
            .field("opaque", &self.inner.opaque)
            .field("colorspace", &self.inner.colorspace)
            .finish_non_exhaustive()
    }
}

/// Atlas of [`ColorStopSequence`]s in a layered texture.
pub struct ColorStopSequenceAtlas<B: ColorStopBacking> {
    backing: RefCell<B>,
    store: Rc<RefCell<DeferredIntervals>>,
    min_estimated: u32,
    max_estimated: u32,
    /// Scratch space for the texels of one upload.
    pixels: RefCell<Vec<Rgba8>>,
}

impl<B: ColorStopBacking> ColorStopSequenceAtlas<B> {
    /// Creates an atlas over `backing` with the default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the backing's layers have zero width.
    pub fn new(backing: B) -> Self {
        Self::with_config(backing, AtlasConfig::default())
    }

    /// Creates an atlas over `backing`.
    ///
    /// # Panics
    ///
    /// Panics if the backing's layers have zero width.
    pub fn with_config(backing: B, config: AtlasConfig) -> Self {
        assert!(backing.layer_width() > 0, "color stop layers must not be empty");
        let mut intervals = IntervalAllocator::new(backing.layer_width(), backing.number_layers());
        intervals.set_tracer(config.tracer);
        Self {
            backing: RefCell::new(backing),
            store: Rc::new(RefCell::new(DeferredIntervals::new(intervals))),
            min_estimated: config.min_estimated_texels,
            max_estimated: config.max_estimated_texels,
            pixels: RefCell::new(Vec::new()),
        }
    }

    /// Discretize `stops` in `colorspace` and upload the texels.
    ///
    /// Stop colors are converted to `colorspace` first. With
    /// `num_texels == 0` the texel count is estimated from the closest pair
    /// of stops.
    ///
    /// # Panics
    ///
    /// Panics if `colorspace` is neither [`ColorSpaceTag::Srgb`] nor
    /// [`ColorSpaceTag::LinearSrgb`].
    pub fn create(
        &self,
        stops: impl ColorStopsSource,
        colorspace: ColorSpaceTag,
        num_texels: u32,
    ) -> Result<ColorStopSequence, Error> {
        assert!(
            matches!(colorspace, ColorSpaceTag::Srgb | ColorSpaceTag::LinearSrgb),
            "color stop sequences are stored in sRGB or linear sRGB, not {colorspace:?}"
        );
        let mut collected = ColorStops::default();
        stops.collect_stops(&mut collected);

        let layer_width = self.backing.borrow().layer_width();
        let (texels, opaque) = discretize(
            &collected,
            colorspace,
            num_texels,
            layer_width,
            self.min_estimated,
            self.max_estimated,
        )?;
        let count = record_count(texels.len());
        let storage = self.allocate_texels(count);
        let Some(interval) = self.store.borrow().intervals.interval(storage) else {
            unreachable!("freshly allocated interval is live");
        };

        let mut pixels = self.pixels.take();
        pixels.clear();
        pixels.extend(texels.into_iter().map(to_rgba8));
        self.backing
            .borrow_mut()
            .load_pixels(interval.layer, interval.begin, &pixels);
        self.pixels.replace(pixels);

        Ok(ColorStopSequence {
            inner: Rc::new(ColorStopSequenceInner {
                owner: self.store.clone(),
                storage,
                layer: interval.layer,
                start: interval.begin,
                num_texels: count,
                opaque,
                colorspace,
            }),
        })
    }

    /// Discretize and upload `stops`, interpolated in linear sRGB.
    pub fn create_linear(
        &self,
        stops: impl ColorStopsSource,
        num_texels: u32,
    ) -> Result<ColorStopSequence, Error> {
        self.create(stops, ColorSpaceTag::LinearSrgb, num_texels)
    }

    /// Discretize and upload `stops`, interpolated in sRGB.
    pub fn create_srgb(
        &self,
        stops: impl ColorStopsSource,
        num_texels: u32,
    ) -> Result<ColorStopSequence, Error> {
        self.create(stops, ColorSpaceTag::Srgb, num_texels)
    }

    /// The backing store.
    ///
    /// Creating sequences while the borrow is held panics; dropping handles
    /// does not.
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
            backing_size: self.backing.borrow().number_layers(),
        }
    }

    fn allocate_texels(&self, count: u32) -> IntervalId {
        let mut store = self.store.borrow_mut();
        if let Some(id) = store.intervals.allocate(count) {
            return id;
        }

        let mut backing = self.backing.borrow_mut();
        let current = backing.number_layers();
        let requested = current.saturating_mul(2).max(current + 1);
        let actual = backing.resize(requested);
        assert!(
            actual >= requested,
            "color stop backing grew to {actual} layers, {requested} were requested"
        );
        log::debug!("color stop backing grown from {current} to {actual} layers");
        store.intervals.set_number_layers(actual);

        let Some(id) = store.intervals.allocate(count) else {
            unreachable!("{count} texels must fit in a fresh layer");
        };
        id
    }
}

impl<B: ColorStopBacking> LockResources for ColorStopSequenceAtlas<B> {
    fn lock_resources(&self) {
        self.store.borrow_mut().lock.lock();
    }

    fn unlock_resources(&self) {
        self.store.borrow_mut().unlock();
    }
}

impl<B: ColorStopBacking> Debug for ColorStopSequenceAtlas<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let backing = self.backing.borrow();
        f.debug_struct("ColorStopSequenceAtlas")
            .field("layer_width", &backing.layer_width())
            .field("number_layers", &backing.number_layers())
            .field("intervals", &self.store.borrow().intervals)
            .finish_non_exhaustive()
    }
}
