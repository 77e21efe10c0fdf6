// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Record types stored in GPU buffers.

use bytemuck::{Pod, Zeroable};

/// Four 32-bit words, each holding a float, a signed or an unsigned integer.
///
/// This is the record of 32-bit static data and the vertex type.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct GVec4(pub [u32; 4]);

impl GVec4 {
    /// Four unsigned integers.
    #[inline]
    pub const fn from_u32(values: [u32; 4]) -> Self {
        Self(values)
    }

    /// Four floats, stored as their bit patterns.
    #[inline]
    pub fn from_f32(values: [f32; 4]) -> Self {
        Self(values.map(f32::to_bits))
    }

    /// Four signed integers, stored as their bit patterns.
    #[inline]
    pub fn from_i32(values: [i32; 4]) -> Self {
        Self(bytemuck::cast(values))
    }

    /// Reinterpret the words as floats.
    #[inline]
    pub fn to_f32(self) -> [f32; 4] {
        self.0.map(f32::from_bits)
    }
}

/// A vertex: four generic 32-bit words whose meaning is up to the shader.
pub type Vertex = GVec4;

/// Four 16-bit words; the record of 16-bit static data.
///
/// Occupies the same eight bytes as a pair of `u32`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct U16Vec4(pub [u16; 4]);

impl U16Vec4 {
    /// Four unsigned 16-bit integers.
    #[inline]
    pub const fn from_u16(values: [u16; 4]) -> Self {
        Self(values)
    }

    /// Two 32-bit words, reinterpreted in place.
    #[inline]
    pub fn from_u32vec2(values: [u32; 2]) -> Self {
        Self(bytemuck::cast(values))
    }

    /// Four floats converted to half precision.
    #[inline]
    pub fn from_f32(values: [f32; 4]) -> Self {
        Self(values.map(|v| half::f16::from_f32(v).to_bits()))
    }

    /// The eight bytes viewed as two 32-bit words.
    #[inline]
    pub fn to_u32vec2(self) -> [u32; 2] {
        bytemuck::cast(self.0)
    }

    /// The half-precision values widened to `f32`.
    #[inline]
    pub fn to_f32(self) -> [f32; 4] {
        self.0.map(|bits| half::f16::from_bits(bits).to_f32())
    }
}
