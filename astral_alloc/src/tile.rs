// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Power-of-two tile allocation within a layered grid.
//!
//! The backing surface is a grid of root tiles of the maximum tile size,
//! `number_tiles_per_layer.0 × number_tiles_per_layer.1` per layer. Root tiles
//! are handed out lazily in grid order. A request for a smaller tile splits a
//! larger free tile in halves along each dimension that is too large, keeping
//! the parent/child relation so that a parent whose children are all free
//! again is merged back on release.
//!
//! Free tiles are kept in one list per size class `(log2_width, log2_height)`.
//! When the exact class is empty, larger classes are tried in a precomputed
//! preference order: candidates that already match in one dimension come
//! first, then those needing the fewest splits, then the one with the
//! smaller width surplus.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};

use smallvec::SmallVec;

use crate::pool::{ObjectPool, PoolPtr};
use crate::{AllocationTracer, Error};

/// Largest log2 tile size along either axis.
pub const MAX_LOG2_TILE_SIZE: u32 = 15;

/// Location and size of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tile {
    /// `(log2 width, log2 height)` of the tile.
    pub log2_size: (u32, u32),
    /// Left edge, in texels.
    pub x: u32,
    /// Top edge, in texels.
    pub y: u32,
    /// Layer of the backing surface.
    pub layer: u32,
}

impl Tile {
    /// `(width, height)` in texels.
    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (1 << self.log2_size.0, 1 << self.log2_size.1)
    }

    /// Area in texels.
    #[inline]
    pub fn area(&self) -> u64 {
        1 << (self.log2_size.0 + self.log2_size.1)
    }
}

/// Identifies a tile handed out by [`TileAllocator::allocate_tile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId {
    node: PoolPtr,
    serial: u32,
}

/// One tile of a [`Region`] together with the part of the region it covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionTile {
    /// The allocated tile.
    pub tile: TileId,
    /// Offset of the covered rectangle within the region.
    pub offset: (u32, u32),
    /// Size of the covered rectangle; never larger than the tile.
    pub size: (u32, u32),
}

/// A rectangle of arbitrary size assembled from up to four tiles.
///
/// The covered rectangles of the tiles partition the region exactly. A
/// region owns its tiles; give it back with [`TileAllocator::release_region`].
#[derive(Debug)]
pub struct Region {
    tiles: SmallVec<[RegionTile; 4]>,
    size: (u32, u32),
}

impl Region {
    /// The tiles making up the region.
    #[inline]
    pub fn tiles(&self) -> &[RegionTile] {
        &self.tiles
    }

    /// `(width, height)` of the region.
    #[inline]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }
}

#[derive(Debug)]
enum TileState {
    /// On the free list of its size class, at index `slot`.
    Free { slot: usize },
    /// Handed out to a caller.
    Allocated { serial: u32 },
    /// Subdivided; the children cover the tile.
    Split { children: SmallVec<[PoolPtr; 4]> },
    /// Taken off a free list and about to be split or allocated.
    Detached,
}

#[derive(Debug)]
struct TileNode {
    tile: Tile,
    parent: Option<PoolPtr>,
    state: TileState,
}

/// Allocator of power-of-two tiles from a layered grid.
pub struct TileAllocator {
    log2_max_tile_size: (u32, u32),
    number_tiles_per_layer: (u32, u32),
    number_layers: u32,
    tiles: ObjectPool<TileNode>,
    /// Free tiles, indexed by size class.
    free_tiles: Vec<Vec<PoolPtr>>,
    /// Larger size classes to split from, in order of preference, indexed by size class.
    order: Vec<Vec<(u32, u32)>>,
    /// Number of root tiles handed out so far.
    alloc_tile_counter: u32,
    live: usize,
    allocated_area: u64,
    next_serial: u32,
}

impl TileAllocator {
    /// Creates an empty allocator.
    ///
    /// Tiles are at most `2^log2_max_tile_size.0 × 2^log2_max_tile_size.1`;
    /// each layer holds `number_tiles_per_layer` tiles of that size.
    ///
    /// # Panics
    ///
    /// Panics if a maximum log2 size exceeds [`MAX_LOG2_TILE_SIZE`], or if a
    /// layer holds no tiles.
    pub fn new(
        log2_max_tile_size: (u32, u32),
        number_tiles_per_layer: (u32, u32),
        number_layers: u32,
    ) -> Self {
        let mut allocator = Self {
            log2_max_tile_size: (0, 0),
            number_tiles_per_layer: (0, 0),
            number_layers: 0,
            tiles: ObjectPool::new("tile"),
            free_tiles: Vec::new(),
            order: Vec::new(),
            alloc_tile_counter: 0,
            live: 0,
            allocated_area: 0,
            next_serial: 0,
        };
        allocator.change_size(log2_max_tile_size, number_tiles_per_layer, number_layers);
        allocator
    }

    /// Attach an allocation tracer to the tile pool.
    pub fn set_tracer(&mut self, tracer: Option<Rc<dyn AllocationTracer>>) {
        self.tiles.set_tracer(tracer);
    }

    /// `(log2 width, log2 height)` of the largest tile.
    #[inline]
    pub fn log2_max_tile_size(&self) -> (u32, u32) {
        self.log2_max_tile_size
    }

    /// `(width, height)` of the largest tile.
    #[inline]
    pub fn max_tile_size(&self) -> (u32, u32) {
        (1 << self.log2_max_tile_size.0, 1 << self.log2_max_tile_size.1)
    }

    /// Number of maximum-size tiles along each axis of a layer.
    #[inline]
    pub fn number_tiles_per_layer(&self) -> (u32, u32) {
        self.number_tiles_per_layer
    }

    /// Number of layers.
    #[inline]
    pub fn number_layers(&self) -> u32 {
        self.number_layers
    }

    /// Number of tiles currently allocated.
    #[inline]
    pub fn number_live_tiles(&self) -> usize {
        self.live
    }

    /// Area of all allocated tiles.
    #[inline]
    pub fn allocated_area(&self) -> u64 {
        self.allocated_area
    }

    /// Area available for allocation: free tiles of every class plus root
    /// tiles that have never been handed out.
    pub fn free_area(&self) -> u64 {
        let (max_w, max_h) = self.log2_max_tile_size;
        let mut area = 0;
        for w in 0..=max_w {
            for h in 0..=max_h {
                area += (self.free_tiles[self.class(w, h)].len() as u64) << (w + h);
            }
        }
        area + (self.root_capacity() - u64::from(self.alloc_tile_counter)) * self.root_area()
    }

    /// Area of the whole grid.
    #[inline]
    pub fn total_area(&self) -> u64 {
        self.root_capacity() * self.root_area()
    }

    /// Allocate a tile of `2^log2_width × 2^log2_height` texels.
    ///
    /// Returns `Ok(None)` when the grid is exhausted; grow it with
    /// [`set_number_layers`](Self::set_number_layers) and retry.
    pub fn allocate_tile(&mut self, log2_width: u32, log2_height: u32) -> Result<Option<TileId>, Error> {
        let (max_w, max_h) = self.log2_max_tile_size;
        if log2_width > max_w || log2_height > max_h {
            return Err(Error::tile_too_large(
                (log2_width, log2_height),
                self.log2_max_tile_size,
            ));
        }

        let target = (log2_width, log2_height);
        let ptr = if let Some(ptr) = self.pop_free(self.class(log2_width, log2_height)) {
            ptr
        } else if let Some(ptr) = self.pop_larger(target) {
            self.split_down(ptr, target)
        } else if let Some(root) = self.new_root() {
            self.split_down(root, target)
        } else {
            return Ok(None);
        };

        let serial = self.next_serial;
        self.next_serial = self.next_serial.wrapping_add(1);
        let node = &mut self.tiles[ptr];
        node.state = TileState::Allocated { serial };
        self.allocated_area += node.tile.area();
        self.live += 1;

        Ok(Some(TileId { node: ptr, serial }))
    }

    /// Release a tile, merging split parents whose children are all free.
    ///
    /// # Panics
    ///
    /// Panics if the tile was already released, or predates
    /// [`release_all`](Self::release_all).
    pub fn release_tile(&mut self, id: TileId) {
        let Some(node) = self.tiles.get(id.node) else {
            panic!("released a tile that does not belong to this allocator");
        };
        match node.state {
            TileState::Allocated { serial } if serial == id.serial => {}
            _ => panic!("tile released twice or after the allocator was reset"),
        }
        self.allocated_area -= node.tile.area();
        self.live -= 1;

        let mut ptr = id.node;
        loop {
            let Some(parent) = self.tiles[ptr].parent else {
                break;
            };
            let TileState::Split { children } = &self.tiles[parent].state else {
                unreachable!("tile parent is not split");
            };
            let siblings_free = children.iter().all(|&child| {
                child == ptr || matches!(self.tiles[child].state, TileState::Free { .. })
            });
            if !siblings_free {
                break;
            }

            let TileState::Split { children } =
                core::mem::replace(&mut self.tiles[parent].state, TileState::Detached)
            else {
                unreachable!();
            };
            for child in children {
                if child != ptr {
                    self.remove_free(child);
                }
                self.tiles.deallocate(child);
            }
            ptr = parent;
        }
        self.push_free(ptr);
    }

    /// Look up a live tile.
    pub fn tile(&self, id: TileId) -> Option<Tile> {
        let node = self.tiles.get(id.node)?;
        match node.state {
            TileState::Allocated { serial } if serial == id.serial => Some(node.tile),
            _ => None,
        }
    }

    /// Allocate a `width × height` region from at most four tiles.
    ///
    /// Each axis is covered by its largest power of two plus, if the size is
    /// not a power of two, a second tile rounded up from the remainder. If any
    /// tile cannot be allocated, the ones already taken are released and
    /// `Ok(None)` is returned.
    pub fn allocate_region(&mut self, width: u32, height: u32) -> Result<Option<Region>, Error> {
        let max = self.max_tile_size();
        if width == 0 || height == 0 {
            return Err(Error::empty_request((width, height), max));
        }
        if width > max.0 || height > max.1 {
            return Err(Error::region_too_large((width, height), max));
        }

        let columns = split_axis(width);
        let rows = split_axis(height);
        let mut tiles: SmallVec<[RegionTile; 4]> = SmallVec::new();
        for &(y, h, log2_h) in &rows {
            for &(x, w, log2_w) in &columns {
                match self.allocate_tile(log2_w, log2_h)? {
                    Some(tile) => tiles.push(RegionTile {
                        tile,
                        offset: (x, y),
                        size: (w, h),
                    }),
                    None => {
                        for taken in tiles {
                            self.release_tile(taken.tile);
                        }
                        return Ok(None);
                    }
                }
            }
        }

        Ok(Some(Region {
            tiles,
            size: (width, height),
        }))
    }

    /// Release every tile of a region.
    pub fn release_region(&mut self, region: Region) {
        for part in region.tiles {
            self.release_tile(part.tile);
        }
    }

    /// Release every tile at once. Outstanding ids become invalid.
    pub fn release_all(&mut self) {
        self.tiles.clear();
        for list in &mut self.free_tiles {
            list.clear();
        }
        self.alloc_tile_counter = 0;
        self.live = 0;
        self.allocated_area = 0;
    }

    /// Reset the allocator and give it a new shape.
    ///
    /// # Panics
    ///
    /// Panics if a maximum log2 size exceeds [`MAX_LOG2_TILE_SIZE`], or if a
    /// layer holds no tiles.
    pub fn change_size(
        &mut self,
        log2_max_tile_size: (u32, u32),
        number_tiles_per_layer: (u32, u32),
        number_layers: u32,
    ) {
        assert!(
            log2_max_tile_size.0 <= MAX_LOG2_TILE_SIZE
                && log2_max_tile_size.1 <= MAX_LOG2_TILE_SIZE,
            "maximum tile size must be below 2^16"
        );
        assert!(
            number_tiles_per_layer.0 > 0 && number_tiles_per_layer.1 > 0,
            "a layer must hold at least one tile"
        );
        self.log2_max_tile_size = log2_max_tile_size;
        self.number_tiles_per_layer = number_tiles_per_layer;
        self.number_layers = number_layers;
        self.order = build_order(log2_max_tile_size);
        self.free_tiles = (0..self.order.len()).map(|_| Vec::new()).collect();
        self.release_all();
    }

    /// Grow the number of layers.
    ///
    /// # Panics
    ///
    /// Panics if `number_layers` is smaller than the current count.
    pub fn set_number_layers(&mut self, number_layers: u32) {
        assert!(
            number_layers >= self.number_layers,
            "tile allocator layers can only grow ({} -> {number_layers})",
            self.number_layers
        );
        self.number_layers = number_layers;
    }

    fn class(&self, log2_width: u32, log2_height: u32) -> usize {
        (log2_width * (self.log2_max_tile_size.1 + 1) + log2_height) as usize
    }

    fn root_capacity(&self) -> u64 {
        let (nx, ny) = self.number_tiles_per_layer;
        u64::from(nx) * u64::from(ny) * u64::from(self.number_layers)
    }

    fn root_area(&self) -> u64 {
        1 << (self.log2_max_tile_size.0 + self.log2_max_tile_size.1)
    }

    fn pop_free(&mut self, class: usize) -> Option<PoolPtr> {
        let ptr = self.free_tiles[class].pop()?;
        self.tiles[ptr].state = TileState::Detached;
        Some(ptr)
    }

    fn pop_larger(&mut self, target: (u32, u32)) -> Option<PoolPtr> {
        let class = self.class(target.0, target.1);
        for index in 0..self.order[class].len() {
            let (w, h) = self.order[class][index];
            if let Some(ptr) = self.pop_free(self.class(w, h)) {
                return Some(ptr);
            }
        }
        None
    }

    fn push_free(&mut self, ptr: PoolPtr) {
        let (w, h) = self.tiles[ptr].tile.log2_size;
        let class = self.class(w, h);
        let slot = self.free_tiles[class].len();
        self.free_tiles[class].push(ptr);
        self.tiles[ptr].state = TileState::Free { slot };
    }

    fn remove_free(&mut self, ptr: PoolPtr) {
        let TileState::Free { slot } = self.tiles[ptr].state else {
            unreachable!("removing a tile that is not free");
        };
        let (w, h) = self.tiles[ptr].tile.log2_size;
        let class = self.class(w, h);
        let list = &mut self.free_tiles[class];
        list.swap_remove(slot);
        if let Some(&moved) = list.get(slot) {
            self.tiles[moved].state = TileState::Free { slot };
        }
        self.tiles[ptr].state = TileState::Detached;
    }

    fn new_root(&mut self) -> Option<PoolPtr> {
        if u64::from(self.alloc_tile_counter) >= self.root_capacity() {
            return None;
        }
        let (nx, ny) = self.number_tiles_per_layer;
        let (max_w, max_h) = self.log2_max_tile_size;
        let index = self.alloc_tile_counter;
        self.alloc_tile_counter += 1;

        let within_layer = index % (nx * ny);
        let tile = Tile {
            log2_size: self.log2_max_tile_size,
            x: (within_layer % nx) << max_w,
            y: (within_layer / nx) << max_h,
            layer: index / (nx * ny),
        };
        Some(self.tiles.allocate(TileNode {
            tile,
            parent: None,
            state: TileState::Detached,
        }))
    }

    /// Split a detached tile until a descendant of size `target` exists;
    /// the descendant at the tile's origin is returned detached, every other
    /// child created along the way goes onto a free list.
    fn split_down(&mut self, ptr: PoolPtr, target: (u32, u32)) -> PoolPtr {
        let mut current = ptr;
        loop {
            let tile = self.tiles[current].tile;
            let (w, h) = tile.log2_size;
            if (w, h) == target {
                return current;
            }

            let (split_x, split_y) = (w > target.0, h > target.1);
            let child_size = (w - u32::from(split_x), h - u32::from(split_y));
            let mut children = SmallVec::<[PoolPtr; 4]>::new();
            for j in 0..=u32::from(split_y) {
                for i in 0..=u32::from(split_x) {
                    children.push(self.tiles.allocate(TileNode {
                        tile: Tile {
                            log2_size: child_size,
                            x: tile.x + (i << child_size.0),
                            y: tile.y + (j << child_size.1),
                            layer: tile.layer,
                        },
                        parent: Some(current),
                        state: TileState::Detached,
                    }));
                }
            }

            for &child in &children[1..] {
                self.push_free(child);
            }
            let first = children[0];
            self.tiles[current].state = TileState::Split { children };
            current = first;
        }
    }
}

impl Debug for TileAllocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TileAllocator")
            .field("log2_max_tile_size", &self.log2_max_tile_size)
            .field("number_tiles_per_layer", &self.number_tiles_per_layer)
            .field("number_layers", &self.number_layers)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}

/// Split preference for every size class, indexed the same way as the free lists.
fn build_order(log2_max: (u32, u32)) -> Vec<Vec<(u32, u32)>> {
    let (max_w, max_h) = log2_max;
    let mut order = Vec::with_capacity(((max_w + 1) * (max_h + 1)) as usize);
    for w in 0..=max_w {
        for h in 0..=max_h {
            let mut candidates = Vec::new();
            for cw in w..=max_w {
                for ch in h..=max_h {
                    if (cw, ch) != (w, h) {
                        candidates.push((cw, ch));
                    }
                }
            }
            candidates.sort_by_key(|&(cw, ch)| {
                let (dw, dh) = (cw - w, ch - h);
                (dw != 0 && dh != 0, dw + dh, dw)
            });
            order.push(candidates);
        }
    }
    order
}

/// Cover `[0, len)` with at most two power-of-two tiles: `(offset, extent, log2 tile size)`.
fn split_axis(len: u32) -> SmallVec<[(u32, u32, u32); 2]> {
    let log2_main = 31 - len.leading_zeros();
    let main = 1 << log2_main;
    let mut parts = SmallVec::new();
    parts.push((0, main, log2_main));
    if len > main {
        let rest = len - main;
        parts.push((main, rest, rest.next_power_of_two().trailing_zeros()));
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_conserved(alloc: &TileAllocator) {
        assert_eq!(
            alloc.allocated_area() + alloc.free_area(),
            alloc.total_area(),
            "allocated and free area should add up to the grid"
        );
    }

    #[test]
    fn max_tile_comes_from_first_grid_slot() {
        let mut alloc = TileAllocator::new((4, 4), (2, 2), 1);
        let a = alloc.allocate_tile(4, 4).unwrap().unwrap();
        let b = alloc.allocate_tile(4, 4).unwrap().unwrap();
        let c = alloc.allocate_tile(4, 4).unwrap().unwrap();
        assert_eq!(alloc.tile(a).unwrap(), Tile { log2_size: (4, 4), x: 0, y: 0, layer: 0 });
        assert_eq!(alloc.tile(b).unwrap(), Tile { log2_size: (4, 4), x: 16, y: 0, layer: 0 });
        assert_eq!(alloc.tile(c).unwrap(), Tile { log2_size: (4, 4), x: 0, y: 16, layer: 0 });
        assert_conserved(&alloc);
    }

    #[test]
    fn small_tile_splits_and_merges_back() {
        let mut alloc = TileAllocator::new((2, 2), (1, 1), 1);
        let a = alloc.allocate_tile(0, 0).unwrap().unwrap();
        assert_eq!(alloc.tile(a).unwrap(), Tile { log2_size: (0, 0), x: 0, y: 0, layer: 0 });
        assert_eq!(alloc.allocated_area(), 1);
        assert_conserved(&alloc);

        // The split leftovers are reused before anything else.
        let b = alloc.allocate_tile(0, 0).unwrap().unwrap();
        let tile = alloc.tile(b).unwrap();
        assert_eq!(tile.log2_size, (0, 0));
        assert!(tile.x < 2 && tile.y < 2, "leftover of the first split should be used");
        assert_conserved(&alloc);

        alloc.release_tile(a);
        alloc.release_tile(b);
        assert_eq!(alloc.number_live_tiles(), 0);
        let whole = alloc.allocate_tile(2, 2).unwrap();
        assert!(whole.is_some(), "released tiles should merge back into the root");
        assert_conserved(&alloc);
    }

    #[test]
    fn preference_order_favours_one_dimension_match() {
        let order = build_order((1, 1));
        assert_eq!(order[0], [(0, 1), (1, 0), (1, 1)]);
        assert_eq!(order[1], [(1, 1)]);
        assert_eq!(order[2], [(1, 1)]);
        assert!(order[3].is_empty());
    }

    #[test]
    fn splits_from_a_partially_used_root() {
        let mut alloc = TileAllocator::new((2, 2), (1, 1), 1);
        // Splitting the root for a 2x4 tile leaves a free 2x4 tile on the right.
        let tall = alloc.allocate_tile(1, 2).unwrap().unwrap();
        let small = alloc.allocate_tile(0, 1).unwrap().unwrap();
        let tile = alloc.tile(small).unwrap();
        assert_eq!((tile.x, tile.y), (2, 0));
        assert_eq!(alloc.tile(tall).unwrap().x, 0);
        assert_conserved(&alloc);
    }

    #[test]
    fn oversized_tile_is_an_error() {
        let mut alloc = TileAllocator::new((3, 3), (1, 1), 1);
        let err = alloc.allocate_tile(4, 0).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::TileTooLarge);
        assert_eq!(err.requested(), (4, 0));
        assert_eq!(err.limit(), (3, 3));
    }

    #[test]
    fn exhaustion_then_growth() {
        let mut alloc = TileAllocator::new((3, 3), (1, 1), 1);
        let a = alloc.allocate_tile(3, 3).unwrap().unwrap();
        assert!(alloc.allocate_tile(0, 0).unwrap().is_none());
        let before = alloc.tile(a).unwrap();

        alloc.set_number_layers(2);
        let b = alloc.allocate_tile(0, 0).unwrap().unwrap();
        assert_eq!(alloc.tile(b).unwrap().layer, 1);
        assert_eq!(alloc.tile(a).unwrap(), before, "growth must not move tiles");
        assert_conserved(&alloc);
    }

    #[test]
    fn region_tiles_partition_the_request() {
        let mut alloc = TileAllocator::new((4, 4), (4, 4), 1);
        for (w, h) in [(1, 1), (3, 5), (7, 7), (16, 16), (9, 13), (15, 1), (16, 3)] {
            let region = alloc.allocate_region(w, h).unwrap().unwrap();
            assert_eq!(region.size(), (w, h));
            assert!(region.tiles().len() <= 4);

            let mut covered = 0;
            for (i, part) in region.tiles().iter().enumerate() {
                let tile = alloc.tile(part.tile).unwrap();
                assert!(part.size.0 <= tile.size().0 && part.size.1 <= tile.size().1);
                assert!(part.offset.0 + part.size.0 <= w && part.offset.1 + part.size.1 <= h);
                covered += part.size.0 * part.size.1;
                for other in &region.tiles()[i + 1..] {
                    let disjoint = part.offset.0 + part.size.0 <= other.offset.0
                        || other.offset.0 + other.size.0 <= part.offset.0
                        || part.offset.1 + part.size.1 <= other.offset.1
                        || other.offset.1 + other.size.1 <= part.offset.1;
                    assert!(disjoint, "region pieces overlap for {w}x{h}");
                }
            }
            assert_eq!(covered, w * h, "region pieces leave a gap for {w}x{h}");
            alloc.release_region(region);
        }
        assert_eq!(alloc.number_live_tiles(), 0);
        assert_conserved(&alloc);
    }

    #[test]
    fn failed_region_rolls_back() {
        let mut alloc = TileAllocator::new((2, 2), (1, 1), 1);
        let _a = alloc.allocate_tile(1, 1).unwrap().unwrap();
        let _b = alloc.allocate_tile(1, 1).unwrap().unwrap();
        // 3x3 needs three of the 2x2 quadrants; only two are left.
        let area_before = alloc.allocated_area();
        assert!(alloc.allocate_region(3, 3).unwrap().is_none());
        assert_eq!(alloc.allocated_area(), area_before);
        assert_conserved(&alloc);
    }

    #[test]
    fn region_errors() {
        let mut alloc = TileAllocator::new((2, 2), (1, 1), 1);
        assert_eq!(
            alloc.allocate_region(5, 1).unwrap_err().kind(),
            crate::ErrorKind::RegionTooLarge
        );
        assert_eq!(
            alloc.allocate_region(0, 1).unwrap_err().kind(),
            crate::ErrorKind::EmptyRequest
        );
    }

    #[test]
    #[should_panic(expected = "tile released twice")]
    fn double_release_panics() {
        let mut alloc = TileAllocator::new((2, 2), (1, 1), 1);
        let a = alloc.allocate_tile(2, 2).unwrap().unwrap();
        alloc.release_tile(a);
        alloc.release_tile(a);
    }

    #[test]
    fn release_all_and_change_size() {
        let mut alloc = TileAllocator::new((2, 2), (1, 1), 1);
        let a = alloc.allocate_tile(1, 0).unwrap().unwrap();
        alloc.release_all();
        assert!(alloc.tile(a).is_none());
        assert_eq!(alloc.free_area(), alloc.total_area());

        alloc.change_size((3, 1), (2, 1), 2);
        assert_eq!(alloc.max_tile_size(), (8, 2));
        assert_eq!(alloc.total_area(), 8 * 2 * 2 * 2);
        let b = alloc.allocate_tile(3, 1).unwrap().unwrap();
        assert_eq!(alloc.tile(b).unwrap().layer, 0);
        assert_conserved(&alloc);
    }

    #[test]
    fn stress_size_conservation() {
        let mut alloc = TileAllocator::new((4, 4), (2, 2), 2);

        let a: usize = 1103515245;
        let c: usize = 12345;
        let m: usize = usize::pow(2, 31);
        let mut seed: usize = 91;
        let mut rand = || {
            seed = (a.wrapping_mul(seed).wrapping_add(c)) % m;
            seed
        };

        let mut live = Vec::new();
        for _ in 0..10000 {
            if rand() % 5 > 2 && !live.is_empty() {
                let nth = rand() % live.len();
                alloc.release_tile(live.swap_remove(nth));
            } else {
                let w = (rand() % 5) as u32;
                let h = (rand() % 5) as u32;
                if let Some(id) = alloc.allocate_tile(w, h).unwrap() {
                    live.push(id);
                }
            }
            assert_conserved(&alloc);
        }

        for id in live.drain(..) {
            alloc.release_tile(id);
        }
        assert_eq!(alloc.allocated_area(), 0);
        assert_eq!(alloc.free_area(), alloc.total_area());
    }
}
