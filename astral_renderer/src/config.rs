// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Atlas configuration and diagnostics.

use alloc::rc::Rc;
use core::fmt::{Debug, Formatter};

use astral_alloc::AllocationTracer;

/// Texel count floor for color stop sequences with an estimated size.
pub const DEFAULT_MIN_ESTIMATED_TEXELS: u32 = 256;

/// Texel count ceiling for color stop sequences with an estimated size.
pub const DEFAULT_MAX_ESTIMATED_TEXELS: u32 = 1024;

/// Settings shared by every atlas constructor.
///
/// `Default` gives the behavior of the plain `new` constructors.
#[derive(Clone)]
pub struct AtlasConfig {
    /// Observer of the atlas' internal node pool.
    pub tracer: Option<Rc<dyn AllocationTracer>>,
    /// Lower bound of the estimated texel count of a color stop sequence.
    pub min_estimated_texels: u32,
    /// Upper bound of the estimated texel count of a color stop sequence;
    /// the backing's layer width caps it further.
    pub max_estimated_texels: u32,
    /// Minimum number of layers an image atlas adds when it runs out of room.
    pub image_growth_layers: u32,
    /// Largest image tile, as `(log2 width, log2 height)`; capped by the
    /// backing's layer size and by [`astral_alloc::MAX_LOG2_TILE_SIZE`].
    pub image_log2_max_tile_size: (u32, u32),
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            tracer: None,
            min_estimated_texels: DEFAULT_MIN_ESTIMATED_TEXELS,
            max_estimated_texels: DEFAULT_MAX_ESTIMATED_TEXELS,
            image_growth_layers: 1,
            image_log2_max_tile_size: (8, 8),
        }
    }
}

impl Debug for AtlasConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AtlasConfig")
            .field("tracer", &self.tracer.is_some())
            .field("min_estimated_texels", &self.min_estimated_texels)
            .field("max_estimated_texels", &self.max_estimated_texels)
            .field("image_growth_layers", &self.image_growth_layers)
            .field("image_log2_max_tile_size", &self.image_log2_max_tile_size)
            .finish()
    }
}

/// A snapshot of an atlas' bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AtlasStats {
    /// Allocations currently held by live handles or awaiting a deferred free.
    pub live_allocations: usize,
    /// Releases waiting for the final unlock.
    pub delayed_frees: usize,
    /// Current lock nesting depth.
    pub lock_depth: u32,
    /// Size of the backing store in the atlas' own unit: records, vertices,
    /// layers or rows.
    pub backing_size: u32,
}
