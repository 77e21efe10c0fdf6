// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Allocators for GPU-resident storage.
//!
//! This crate holds the bookkeeping half of Astral's resource management; it
//! never touches a GPU itself. Every allocator here hands out opaque ids
//! describing where something lives in a backing store, and the owner of the
//! backing store does the uploading.
//!
//! - [`IntervalAllocator`]: best-fit 1D intervals within equally long layers,
//!   used for buffers and texture rows.
//! - [`TileAllocator`]: power-of-two tiles split from, and merged back into, a
//!   layered grid; [`TileAllocator::allocate_region`] assembles arbitrary
//!   rectangles from up to four tiles.
//! - [`LayeredRectAtlas`]: exact-size guillotine rectangle packing.
//! - [`ObjectPool`]: the slab the allocators keep their nodes in.
//!
//! Running out of space is reported with `None`. The caller grows the
//! allocator (growth is append-only, so existing ids stay valid) and retries.
//! [`Error`] is reserved for requests that no amount of growth can satisfy.
//!
//! ## Features
//!
//! - `std` (enabled by default): Currently unused; the crate only needs `alloc`.
//!
//! ## Example
//!
//! ```
//! use astral_alloc::IntervalAllocator;
//!
//! let mut intervals = IntervalAllocator::new(1024, 1);
//! let id = match intervals.allocate(300) {
//!     Some(id) => id,
//!     None => {
//!         intervals.set_layer_length(2048);
//!         intervals.allocate(300).unwrap()
//!     }
//! };
//! let interval = intervals.interval(id).unwrap();
//! assert_eq!(interval.len(), 300);
//! intervals.release(id);
//! ```

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

extern crate alloc;

mod error;
mod interval;
mod pool;
mod rect_atlas;
mod tile;
mod trace;

pub use error::{Error, ErrorKind};
pub use interval::{Interval, IntervalAllocator, IntervalId};
pub use pool::{ObjectPool, PoolPtr};
pub use rect_atlas::{LayeredRectAtlas, RectAllocation, RectId};
pub use tile::{MAX_LOG2_TILE_SIZE, Region, RegionTile, Tile, TileAllocator, TileId};
pub use trace::AllocationTracer;
