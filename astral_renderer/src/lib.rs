// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! GPU resource atlases for the Astral renderer.
//!
//! Each atlas owns a backing store (a buffer or texture implemented by the
//! GPU backend through the traits in this crate) and hands out
//! reference-counted handles to regions of it:
//!
//! - [`StaticDataAllocatorCommon`] → [`StaticData`] (see [`StaticDataAllocator32`], [`StaticDataAllocator16`])
//! - [`VertexDataAllocator`] → [`VertexData`]
//! - [`ColorStopSequenceAtlas`] → [`ColorStopSequence`], from [`peniko::ColorStop`]s
//! - [`ShadowMapAtlas`] → [`ShadowMap`]
//! - [`ImageAtlas`] → [`Image`]
//!
//! Backing stores grow on demand and never move what they already hold, so
//! a handle's location is fixed for its lifetime.
//!
//! When the last clone of a handle is dropped its storage is returned to the
//! atlas. While the atlas is locked (see [`LockResources`] and [`FrameGuard`])
//! that return is deferred to the final unlock, so storage referenced by GPU
//! commands of the current frame is never handed out twice.
//!
//! Handles and atlases are single-threaded (`!Send`).
//!
//! ## Features
//!
//! - `std` (enabled by default): Get floating point functions from the standard library
//!   (likely using your target's libc).
//! - `libm`: Use floating point implementations from [libm].
//!
//! At least one of `std` and `libm` is required; `std` overrides `libm`.
//!
//! [libm]: https://crates.io/crates/libm

// LINEBENDER LINT SET - lib.rs - v3
// See https://linebender.org/wiki/canonical-lints/
// These lints shouldn't apply to examples or tests.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
// These lints shouldn't apply to examples.
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

#[cfg(not(any(feature = "std", feature = "libm")))]
compile_error!("astral_renderer requires either the `std` or `libm` feature to be enabled");

extern crate alloc;

pub use astral_alloc;
pub use peniko;

mod backing;
mod colorstop;
mod config;
mod data;
mod error;
mod frame;
mod image_atlas;
mod lock;
mod shadow_map;
mod static_data;
mod vertex_data;

pub use backing::{
    ColorStopBacking, ImageBacking, ShadowMapBacking, StaticDataBacking, StaticDataRecord,
    VertexBacking,
};
pub use colorstop::{ColorStopSequence, ColorStopSequenceAtlas};
pub use config::{
    AtlasConfig, AtlasStats, DEFAULT_MAX_ESTIMATED_TEXELS, DEFAULT_MIN_ESTIMATED_TEXELS,
};
pub use data::{GVec4, U16Vec4, Vertex};
pub use error::{Error, ErrorKind};
pub use frame::FrameGuard;
pub use image_atlas::{Image, ImageAtlas, ImageTile};
pub use lock::LockResources;
pub use shadow_map::{ShadowMap, ShadowMapAtlas, ShadowMapId, ShadowMapSide};
pub use static_data::{
    StaticData, StaticDataAllocator16, StaticDataAllocator32, StaticDataAllocatorCommon,
};
pub use vertex_data::{VertexData, VertexDataAllocator};
