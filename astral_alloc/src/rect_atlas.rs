// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Guillotine rectangle packing across the layers of an array texture.
//!
//! Unlike [`TileAllocator`](crate::TileAllocator), rectangles keep their
//! exact requested size. Each layer keeps a list of free rectangles; a
//! request takes the free rectangle with the best short-side fit from any
//! layer and cuts the remainder into two free rectangles. Free rectangles
//! sharing a full edge are merged again on release, and a layer whose last
//! rectangle goes away is reset to a single free rectangle.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};

use crate::AllocationTracer;
use crate::pool::{ObjectPool, PoolPtr};

/// Identifies a rectangle handed out by [`LayeredRectAtlas::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RectId {
    node: PoolPtr,
    serial: u32,
}

/// A packed rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RectAllocation {
    /// Id to pass to [`LayeredRectAtlas::release`].
    pub id: RectId,
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width as requested.
    pub width: u32,
    /// Height as requested.
    pub height: u32,
    /// Layer of the array texture.
    pub layer: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl Rect {
    fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// The union of two rectangles sharing a full edge.
    fn merged(self, other: Self) -> Option<Self> {
        if self.y == other.y && self.height == other.height {
            if self.x + self.width == other.x {
                return Some(Self { width: self.width + other.width, ..self });
            }
            if other.x + other.width == self.x {
                return Some(Self { width: self.width + other.width, ..other });
            }
        }
        if self.x == other.x && self.width == other.width {
            if self.y + self.height == other.y {
                return Some(Self { height: self.height + other.height, ..self });
            }
            if other.y + other.height == self.y {
                return Some(Self { height: self.height + other.height, ..other });
            }
        }
        None
    }
}

#[derive(Debug)]
struct Placed {
    rect: Rect,
    layer: u32,
    serial: u32,
}

#[derive(Debug, Default)]
struct Layer {
    free: Vec<Rect>,
    live: usize,
}

/// Rectangle allocator over a fixed-size, growable array of layers.
pub struct LayeredRectAtlas {
    width: u32,
    height: u32,
    layers: Vec<Layer>,
    placed: ObjectPool<Placed>,
    next_serial: u32,
}

impl LayeredRectAtlas {
    /// Creates an atlas of `number_layers` empty `width × height` layers.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero.
    pub fn new(width: u32, height: u32, number_layers: u32) -> Self {
        assert!(width > 0 && height > 0, "atlas layers must not be empty");
        let mut atlas = Self {
            width,
            height,
            layers: Vec::new(),
            placed: ObjectPool::new("rect"),
            next_serial: 0,
        };
        atlas.set_number_layers(number_layers);
        atlas
    }

    /// Attach an allocation tracer to the rectangle pool.
    pub fn set_tracer(&mut self, tracer: Option<Rc<dyn AllocationTracer>>) {
        self.placed.set_tracer(tracer);
    }

    /// Width of every layer.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of every layer.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of layers.
    #[inline]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "layers are only ever added through `set_number_layers`, which takes a u32"
    )]
    pub fn number_layers(&self) -> u32 {
        self.layers.len() as u32
    }

    /// Number of live rectangles.
    #[inline]
    pub fn number_live_rects(&self) -> usize {
        self.placed.len()
    }

    /// Place a `width × height` rectangle.
    ///
    /// Returns `None` when no layer has room. Empty requests and requests
    /// larger than a layer never succeed.
    pub fn allocate(&mut self, width: u32, height: u32) -> Option<RectAllocation> {
        if width == 0 || height == 0 || width > self.width || height > self.height {
            return None;
        }

        let mut best: Option<(u32, usize, usize)> = None;
        for (layer_index, layer) in self.layers.iter().enumerate() {
            for (free_index, free) in layer.free.iter().enumerate() {
                if free.width < width || free.height < height {
                    continue;
                }
                let short_side = (free.width - width).min(free.height - height);
                if best.is_none_or(|(score, _, _)| short_side < score) {
                    best = Some((short_side, layer_index, free_index));
                }
            }
        }
        let (_, layer_index, free_index) = best?;

        let layer = &mut self.layers[layer_index];
        let chosen = layer.free.swap_remove(free_index);
        let (first, second) = guillotine(chosen, width, height);
        layer.free.extend(first);
        layer.free.extend(second);
        layer.live += 1;

        let rect = Rect {
            x: chosen.x,
            y: chosen.y,
            width,
            height,
        };
        #[expect(
            clippy::cast_possible_truncation,
            reason = "layer count fits in u32"
        )]
        let layer = layer_index as u32;
        let serial = self.next_serial;
        self.next_serial = self.next_serial.wrapping_add(1);
        let node = self.placed.allocate(Placed {
            rect,
            layer,
            serial,
        });

        Some(RectAllocation {
            id: RectId { node, serial },
            x: rect.x,
            y: rect.y,
            width,
            height,
            layer,
        })
    }

    /// Release a rectangle.
    ///
    /// # Panics
    ///
    /// Panics if the rectangle was already released, or predates
    /// [`clear`](Self::clear).
    pub fn release(&mut self, id: RectId) {
        match self.placed.get(id.node) {
            Some(placed) if placed.serial == id.serial => {}
            _ => panic!("rectangle released twice or after the atlas was cleared"),
        }
        let Some(placed) = self.placed.deallocate(id.node) else {
            unreachable!();
        };

        let layer = &mut self.layers[placed.layer as usize];
        layer.live -= 1;
        if layer.live == 0 {
            layer.free.clear();
            layer.free.push(Rect {
                x: 0,
                y: 0,
                width: self.width,
                height: self.height,
            });
            return;
        }

        let mut rect = placed.rect;
        while let Some((index, merged)) = layer
            .free
            .iter()
            .enumerate()
            .find_map(|(i, free)| rect.merged(*free).map(|m| (i, m)))
        {
            layer.free.swap_remove(index);
            rect = merged;
        }
        layer.free.push(rect);
    }

    /// Look up a live rectangle.
    pub fn rect(&self, id: RectId) -> Option<RectAllocation> {
        let placed = self.placed.get(id.node)?;
        (placed.serial == id.serial).then_some(RectAllocation {
            id,
            x: placed.rect.x,
            y: placed.rect.y,
            width: placed.rect.width,
            height: placed.rect.height,
            layer: placed.layer,
        })
    }

    /// Grow the number of layers; existing rectangles keep their place.
    ///
    /// # Panics
    ///
    /// Panics if `number_layers` is smaller than the current count.
    pub fn set_number_layers(&mut self, number_layers: u32) {
        assert!(
            number_layers >= self.number_layers(),
            "rect atlas layers can only grow ({} -> {number_layers})",
            self.number_layers()
        );
        let (width, height) = (self.width, self.height);
        self.layers.resize_with(number_layers as usize, || Layer {
            free: alloc::vec![Rect {
                x: 0,
                y: 0,
                width,
                height,
            }],
            live: 0,
        });
    }

    /// Release every rectangle. Outstanding ids become invalid.
    pub fn clear(&mut self) {
        self.placed.clear();
        for layer in &mut self.layers {
            layer.live = 0;
            layer.free.clear();
            layer.free.push(Rect {
                x: 0,
                y: 0,
                width: self.width,
                height: self.height,
            });
        }
    }

    /// Total free area across all layers.
    pub fn free_area(&self) -> u64 {
        self.layers
            .iter()
            .flat_map(|layer| &layer.free)
            .map(|rect| rect.area())
            .sum()
    }
}

impl Debug for LayeredRectAtlas {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LayeredRectAtlas")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("number_layers", &self.layers.len())
            .field("live", &self.placed.len())
            .finish_non_exhaustive()
    }
}

/// Cut `chosen` after placing `width × height` at its origin.
///
/// The cut runs along whichever axis leaves the larger of the two
/// leftovers whole.
fn guillotine(chosen: Rect, width: u32, height: u32) -> (Option<Rect>, Option<Rect>) {
    let right_width = chosen.width - width;
    let bottom_height = chosen.height - height;
    let right_strip = u64::from(right_width) * u64::from(height);
    let bottom_strip = u64::from(width) * u64::from(bottom_height);

    let (right, bottom) = if right_strip > bottom_strip {
        (
            Rect {
                x: chosen.x + width,
                y: chosen.y,
                width: right_width,
                height: chosen.height,
            },
            Rect {
                x: chosen.x,
                y: chosen.y + height,
                width,
                height: bottom_height,
            },
        )
    } else {
        (
            Rect {
                x: chosen.x + width,
                y: chosen.y,
                width: right_width,
                height,
            },
            Rect {
                x: chosen.x,
                y: chosen.y + height,
                width: chosen.width,
                height: bottom_height,
            },
        )
    };
    let keep = |r: Rect| (r.width > 0 && r.height > 0).then_some(r);
    (keep(right), keep(bottom))
}
