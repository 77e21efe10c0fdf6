// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory backings and helpers shared across tests.

use std::cell::Cell;
use std::rc::Rc;

use astral_alloc::AllocationTracer;
use astral_renderer::{
    AtlasConfig, ColorStopBacking, ImageBacking, ShadowMapBacking, StaticDataBacking,
    StaticDataRecord, Vertex, VertexBacking,
};
use peniko::color::Rgba8;

pub(crate) const CLEAR: Rgba8 = Rgba8 {
    r: 0,
    g: 0,
    b: 0,
    a: 0,
};

/// A linear buffer of records or vertices.
#[derive(Debug)]
pub(crate) struct Buffer<T> {
    pub(crate) data: Vec<T>,
    /// Every size passed to `resize`, in order.
    pub(crate) resizes: Vec<u32>,
}

impl<T: Default + Clone> Buffer<T> {
    pub(crate) fn new(size: u32) -> Self {
        Self {
            data: vec![T::default(); size as usize],
            resizes: Vec::new(),
        }
    }

    fn grow(&mut self, new_size: u32) -> u32 {
        self.resizes.push(new_size);
        self.data.resize(new_size as usize, T::default());
        new_size
    }

    fn write(&mut self, offset: u32, values: &[T]) {
        let offset = offset as usize;
        self.data[offset..offset + values.len()].clone_from_slice(values);
    }

    /// The `len` values starting at `offset`.
    pub(crate) fn slice(&self, offset: u32, len: u32) -> &[T] {
        &self.data[offset as usize..(offset + len) as usize]
    }
}

impl<R: StaticDataRecord + Default + 'static> StaticDataBacking for Buffer<R> {
    type Record = R;

    fn size(&self) -> u32 {
        self.data.len() as u32
    }

    fn resize(&mut self, new_size: u32) -> u32 {
        self.grow(new_size)
    }

    fn set_data(&mut self, offset: u32, records: &[R]) {
        self.write(offset, records);
    }
}

/// A vertex buffer; wraps a [`Buffer`] so it can't be mixed up with static data.
#[derive(Debug)]
pub(crate) struct VertexBuffer(pub(crate) Buffer<Vertex>);

impl VertexBuffer {
    pub(crate) fn new(size: u32) -> Self {
        Self(Buffer::new(size))
    }
}

impl VertexBacking for VertexBuffer {
    fn size(&self) -> u32 {
        self.0.data.len() as u32
    }

    fn resize(&mut self, new_size: u32) -> u32 {
        self.0.grow(new_size)
    }

    fn set_data(&mut self, offset: u32, vertices: &[Vertex]) {
        self.0.write(offset, vertices);
    }
}

/// Rows of color stop texels, one per layer.
#[derive(Debug)]
pub(crate) struct StopTexture {
    pub(crate) width: u32,
    pub(crate) layers: Vec<Vec<Rgba8>>,
    pub(crate) resizes: Vec<u32>,
}

impl StopTexture {
    pub(crate) fn new(width: u32, number_layers: u32) -> Self {
        Self {
            width,
            layers: vec![vec![CLEAR; width as usize]; number_layers as usize],
            resizes: Vec::new(),
        }
    }

    /// The `count` texels of `layer` starting at `start`.
    pub(crate) fn texels(&self, layer: u32, start: u32, count: u32) -> &[Rgba8] {
        &self.layers[layer as usize][start as usize..(start + count) as usize]
    }
}

impl ColorStopBacking for StopTexture {
    fn layer_width(&self) -> u32 {
        self.width
    }

    fn number_layers(&self) -> u32 {
        self.layers.len() as u32
    }

    fn resize(&mut self, new_layers: u32) -> u32 {
        self.resizes.push(new_layers);
        self.layers
            .resize(new_layers as usize, vec![CLEAR; self.width as usize]);
        new_layers
    }

    fn load_pixels(&mut self, layer: u32, offset: u32, pixels: &[Rgba8]) {
        let offset = offset as usize;
        self.layers[layer as usize][offset..offset + pixels.len()].copy_from_slice(pixels);
    }
}

/// A depth texture that only tracks its size.
#[derive(Debug)]
pub(crate) struct DepthTexture {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) resizes: Vec<u32>,
    pub(crate) target: &'static str,
}

impl DepthTexture {
    pub(crate) fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            resizes: Vec::new(),
            target: "shadow depth",
        }
    }
}

impl ShadowMapBacking for DepthTexture {
    type RenderTarget = &'static str;

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn resize(&mut self, new_height: u32) -> u32 {
        self.resizes.push(new_height);
        self.height = new_height;
        new_height
    }

    fn render_target(&self) -> &&'static str {
        &self.target
    }
}

/// An array texture of row-major RGBA8 layers.
#[derive(Debug)]
pub(crate) struct ImageTexture {
    pub(crate) size: (u32, u32),
    pub(crate) layers: Vec<Vec<Rgba8>>,
    pub(crate) resizes: Vec<u32>,
}

impl ImageTexture {
    pub(crate) fn new(width: u32, height: u32, number_layers: u32) -> Self {
        Self {
            size: (width, height),
            layers: vec![vec![CLEAR; (width * height) as usize]; number_layers as usize],
            resizes: Vec::new(),
        }
    }

    pub(crate) fn pixel(&self, layer: u32, x: u32, y: u32) -> Rgba8 {
        self.layers[layer as usize][(y * self.size.0 + x) as usize]
    }
}

impl ImageBacking for ImageTexture {
    fn layer_size(&self) -> (u32, u32) {
        self.size
    }

    fn number_layers(&self) -> u32 {
        self.layers.len() as u32
    }

    fn resize(&mut self, new_layers: u32) -> u32 {
        self.resizes.push(new_layers);
        let area = (self.size.0 * self.size.1) as usize;
        self.layers.resize(new_layers as usize, vec![CLEAR; area]);
        new_layers
    }

    fn upload(&mut self, layer: u32, origin: (u32, u32), size: (u32, u32), pixels: &[Rgba8]) {
        assert_eq!(
            pixels.len(),
            (size.0 * size.1) as usize,
            "upload size does not match the pixel count"
        );
        let width = self.size.0;
        let layer = &mut self.layers[layer as usize];
        for (row, line) in pixels.chunks(size.0 as usize).enumerate() {
            let start = ((origin.1 + row as u32) * width + origin.0) as usize;
            layer[start..start + line.len()].copy_from_slice(line);
        }
    }
}

/// Counts pool allocations reported to it.
#[derive(Debug, Default)]
pub(crate) struct CountingTracer {
    pub(crate) allocated: Cell<usize>,
    pub(crate) deallocated: Cell<usize>,
    pub(crate) live: Cell<usize>,
}

impl AllocationTracer for CountingTracer {
    fn on_allocate(&self, _label: &'static str, live: usize) {
        self.allocated.set(self.allocated.get() + 1);
        self.live.set(live);
    }

    fn on_deallocate(&self, _label: &'static str, live: usize) {
        self.deallocated.set(self.deallocated.get() + 1);
        self.live.set(live);
    }
}

/// A configuration reporting to `tracer`.
pub(crate) fn traced(tracer: &Rc<CountingTracer>) -> AtlasConfig {
    let tracer: Rc<dyn AllocationTracer> = tracer.clone();
    AtlasConfig {
        tracer: Some(tracer),
        ..AtlasConfig::default()
    }
}

/// An opaque color that encodes `index`, for checking where pixels ended up.
pub(crate) fn marker(index: u32) -> Rgba8 {
    Rgba8 {
        r: (index & 0xff) as u8,
        g: ((index >> 8) & 0xff) as u8,
        b: 0x5a,
        a: 0xff,
    }
}

/// Deterministic pseudo-random numbers for stress tests.
#[derive(Debug)]
pub(crate) struct Lcg(pub(crate) u64);

impl Lcg {
    pub(crate) fn next(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) as u32
    }

    /// A number in `lo..=hi`.
    pub(crate) fn range(&mut self, lo: u32, hi: u32) -> u32 {
        lo + self.next() % (hi - lo + 1)
    }
}
