// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Interfaces to the GPU storage behind each atlas.
//!
//! The atlases in this crate only do bookkeeping. Whoever owns the GPU
//! device implements these traits on top of its buffers and textures; an
//! atlas takes exclusive ownership of its backing.
//!
//! Growth is append-only: after `resize`, everything stored before must stay
//! where it was, because handles keep their location for their whole life.
//! Every `resize` returns the size actually provided, which may exceed the
//! request but never fall short of it.

use peniko::color::Rgba8;

use crate::{GVec4, U16Vec4, Vertex};

/// Record of a static data buffer.
pub trait StaticDataRecord: bytemuck::Pod + core::fmt::Debug {}

impl StaticDataRecord for GVec4 {}
impl StaticDataRecord for U16Vec4 {}

/// A linear buffer of static data records.
pub trait StaticDataBacking: 'static {
    /// The record the buffer stores: [`GVec4`] for 32-bit data, [`U16Vec4`]
    /// for 16-bit data.
    type Record: StaticDataRecord;

    /// Current size, in records.
    fn size(&self) -> u32;

    /// Grow to at least `new_size` records, returning the new size.
    fn resize(&mut self, new_size: u32) -> u32;

    /// Write `records` starting at record `offset`.
    fn set_data(&mut self, offset: u32, records: &[Self::Record]);
}

/// A linear buffer of vertices.
pub trait VertexBacking: 'static {
    /// Current size, in vertices.
    fn size(&self) -> u32;

    /// Grow to at least `new_size` vertices, returning the new size.
    fn resize(&mut self, new_size: u32) -> u32;

    /// Write `vertices` starting at vertex `offset`.
    fn set_data(&mut self, offset: u32, vertices: &[Vertex]);
}

/// An array texture whose rows hold color stop sequences.
///
/// Every layer is one row of [`layer_width`](Self::layer_width) texels.
pub trait ColorStopBacking: 'static {
    /// Texels per layer.
    fn layer_width(&self) -> u32;

    /// Current number of layers.
    fn number_layers(&self) -> u32;

    /// Grow to at least `new_layers` layers, returning the new count.
    fn resize(&mut self, new_layers: u32) -> u32;

    /// Upload `pixels` into `layer`, starting at texel `offset`.
    fn load_pixels(&mut self, layer: u32, offset: u32, pixels: &[Rgba8]);
}

/// A depth texture that shadow maps are rendered into.
pub trait ShadowMapBacking: 'static {
    /// Whatever the renderer needs to draw into the texture.
    type RenderTarget;

    /// Width of the texture; the largest shadow map dimension.
    fn width(&self) -> u32;

    /// Current height of the texture, in rows.
    fn height(&self) -> u32;

    /// Grow to at least `new_height` rows, returning the new height.
    fn resize(&mut self, new_height: u32) -> u32;

    /// The render target covering the whole texture.
    fn render_target(&self) -> &Self::RenderTarget;
}

/// An array texture holding image tiles.
pub trait ImageBacking: 'static {
    /// `(width, height)` of every layer.
    fn layer_size(&self) -> (u32, u32);

    /// Current number of layers.
    fn number_layers(&self) -> u32;

    /// Grow to at least `new_layers` layers, returning the new count.
    fn resize(&mut self, new_layers: u32) -> u32;

    /// Upload a `size.0 × size.1` block of row-major `pixels` to `origin` in `layer`.
    fn upload(&mut self, layer: u32, origin: (u32, u32), size: (u32, u32), pixels: &[Rgba8]);
}
