// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One-dimensional interval allocation within equal-length layers.
//!
//! Every layer is a doubly-linked list of nodes that partitions
//! `[0, layer_length)`. Free nodes are additionally indexed by their size, so
//! an allocation finds the smallest free interval that is large enough
//! (best fit) with a single ordered lookup. Released intervals are merged with
//! free neighbours immediately, so no two adjacent free nodes ever exist.
//!
//! Growth, either by adding layers or by lengthening every layer, only ever
//! appends space: existing intervals keep their position.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::fmt::{Debug, Formatter};

use crate::AllocationTracer;
use crate::pool::{ObjectPool, PoolPtr};

/// A half-open range `[begin, end)` within one layer of an [`IntervalAllocator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    /// First element covered by the interval.
    pub begin: u32,
    /// One past the last element covered by the interval.
    pub end: u32,
    /// Layer holding the interval.
    pub layer: u32,
}

impl Interval {
    /// Number of elements covered.
    #[inline]
    pub fn len(&self) -> u32 {
        self.end - self.begin
    }

    /// Whether the interval covers nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

/// Identifies an interval handed out by [`IntervalAllocator::allocate`].
///
/// The id is only meaningful to the allocator that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntervalId {
    node: PoolPtr,
    serial: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Free,
    Allocated { serial: u32 },
}

#[derive(Debug)]
struct Node {
    begin: u32,
    end: u32,
    layer: u32,
    prev: Option<PoolPtr>,
    next: Option<PoolPtr>,
    state: NodeState,
}

impl Node {
    fn size(&self) -> u32 {
        self.end - self.begin
    }

    fn free_key(&self, ptr: PoolPtr) -> FreeKey {
        (self.layer, self.begin, ptr)
    }
}

#[derive(Debug, Clone, Copy)]
struct Layer {
    head: PoolPtr,
    tail: PoolPtr,
}

/// Ordering of free nodes of equal size: lowest layer first, then lowest offset.
type FreeKey = (u32, u32, PoolPtr);

/// Best-fit allocator of 1D intervals within a set of equal-length layers.
pub struct IntervalAllocator {
    nodes: ObjectPool<Node>,
    layers: Vec<Layer>,
    /// Free nodes keyed by size; only sizes with at least one free node are present.
    free: BTreeMap<u32, BTreeSet<FreeKey>>,
    layer_length: u32,
    live: usize,
    next_serial: u32,
}

impl IntervalAllocator {
    /// Creates an allocator of `number_layers` empty layers, each `length` long.
    ///
    /// # Panics
    ///
    /// Panics if `length` is zero.
    pub fn new(length: u32, number_layers: u32) -> Self {
        let mut allocator = Self {
            nodes: ObjectPool::new("interval node"),
            layers: Vec::new(),
            free: BTreeMap::new(),
            layer_length: 0,
            live: 0,
            next_serial: 0,
        };
        allocator.reset(length, number_layers);
        allocator
    }

    /// Attach an allocation tracer to the node pool.
    pub fn set_tracer(&mut self, tracer: Option<Rc<dyn AllocationTracer>>) {
        self.nodes.set_tracer(tracer);
    }

    /// Length of every layer.
    #[inline]
    pub fn layer_length(&self) -> u32 {
        self.layer_length
    }

    /// Number of layers.
    #[inline]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "layers are only ever added up to a u32 count"
    )]
    pub fn number_layers(&self) -> u32 {
        self.layers.len() as u32
    }

    /// Number of intervals currently allocated.
    #[inline]
    pub fn number_live_intervals(&self) -> usize {
        self.live
    }

    /// Whether any interval is currently allocated.
    #[inline]
    pub fn has_live_intervals(&self) -> bool {
        self.live > 0
    }

    /// Allocate an interval of `size` elements.
    ///
    /// Picks the smallest free interval that can hold `size`; ties go to the
    /// lowest layer and then the lowest offset. Any surplus is split off and
    /// stays free. Returns `None` if no layer has room (or `size` is zero);
    /// the caller may then grow the allocator and retry.
    pub fn allocate(&mut self, size: u32) -> Option<IntervalId> {
        if size == 0 {
            return None;
        }

        let (found_size, (_, _, ptr)) = {
            let (&found_size, set) = self.free.range_mut(size..).next()?;
            (found_size, set.pop_first()?)
        };
        if self.free.get(&found_size).is_some_and(BTreeSet::is_empty) {
            self.free.remove(&found_size);
        }

        if found_size > size {
            let node = &mut self.nodes[ptr];
            let split = node.begin + size;
            let rest = Node {
                begin: split,
                end: node.end,
                layer: node.layer,
                prev: Some(ptr),
                next: node.next,
                state: NodeState::Free,
            };
            node.end = split;
            let next = rest.next;
            let layer = rest.layer as usize;

            let rest = self.nodes.allocate(rest);
            self.nodes[ptr].next = Some(rest);
            match next {
                Some(next) => self.nodes[next].prev = Some(rest),
                None => self.layers[layer].tail = rest,
            }
            self.insert_free(rest);
        }

        let serial = self.next_serial;
        self.next_serial = self.next_serial.wrapping_add(1);
        self.nodes[ptr].state = NodeState::Allocated { serial };
        self.live += 1;

        Some(IntervalId { node: ptr, serial })
    }

    /// Return an interval to the allocator, merging it with free neighbours.
    ///
    /// # Panics
    ///
    /// Panics if `id` was already released or predates a [`clear`](Self::clear).
    pub fn release(&mut self, id: IntervalId) {
        self.validate(id);
        self.nodes[id.node].state = NodeState::Free;
        self.live -= 1;

        let mut ptr = id.node;
        if let Some(prev) = self.nodes[ptr].prev {
            if self.nodes[prev].state == NodeState::Free {
                self.remove_free(prev);
                self.absorb_next(prev);
                ptr = prev;
            }
        }
        if let Some(next) = self.nodes[ptr].next {
            if self.nodes[next].state == NodeState::Free {
                self.remove_free(next);
                self.absorb_next(ptr);
            }
        }
        self.insert_free(ptr);
    }

    /// Look up the extent of a live interval.
    pub fn interval(&self, id: IntervalId) -> Option<Interval> {
        let node = self.nodes.get(id.node)?;
        match node.state {
            NodeState::Allocated { serial } if serial == id.serial => Some(Interval {
                begin: node.begin,
                end: node.end,
                layer: node.layer,
            }),
            _ => None,
        }
    }

    /// Grow the number of layers to `number_layers`.
    ///
    /// # Panics
    ///
    /// Panics if `number_layers` is smaller than the current count.
    pub fn set_number_layers(&mut self, number_layers: u32) {
        let current = self.number_layers();
        assert!(
            number_layers >= current,
            "interval allocator layers can only grow ({current} -> {number_layers})"
        );
        for layer in current..number_layers {
            self.add_layer(layer);
        }
    }

    /// Grow the length of every layer to `length`.
    ///
    /// # Panics
    ///
    /// Panics if `length` is smaller than the current layer length.
    pub fn set_layer_length(&mut self, length: u32) {
        let current = self.layer_length;
        assert!(
            length >= current,
            "interval allocator layer length can only grow ({current} -> {length})"
        );
        if length == current {
            return;
        }
        self.layer_length = length;

        for index in 0..self.layers.len() {
            let tail = self.layers[index].tail;
            if self.nodes[tail].state == NodeState::Free {
                self.remove_free(tail);
                self.nodes[tail].end = length;
                self.insert_free(tail);
            } else {
                let appended = self.nodes.allocate(Node {
                    begin: current,
                    end: length,
                    layer: self.nodes[tail].layer,
                    prev: Some(tail),
                    next: None,
                    state: NodeState::Free,
                });
                self.nodes[tail].next = Some(appended);
                self.layers[index].tail = appended;
                self.insert_free(appended);
            }
        }
    }

    /// Drop every interval and reshape the allocator.
    ///
    /// Every outstanding [`IntervalId`] becomes invalid; releasing one
    /// afterwards panics.
    pub fn clear(&mut self, length: u32, number_layers: u32) {
        self.reset(length, number_layers);
    }

    /// Verify the internal invariants, returning the number of live intervals.
    ///
    /// # Panics
    ///
    /// Panics if a layer does not partition `[0, layer_length)`, if two
    /// adjacent nodes are both free, or if the free-size index is out of sync.
    pub fn check(&self) -> usize {
        let mut allocated = 0;
        let mut free_nodes = 0;

        for (layer, index) in self.layers.iter().zip(0_u32..) {
            let mut cursor = Some(layer.head);
            let mut prev = None;
            let mut expected_begin = 0;
            let mut prev_free = false;

            while let Some(ptr) = cursor {
                let node = &self.nodes[ptr];
                assert_eq!(node.layer, index, "node linked into the wrong layer");
                assert_eq!(node.begin, expected_begin, "gap or overlap within a layer");
                assert!(node.end > node.begin, "empty node within a layer");
                assert_eq!(node.prev, prev, "broken back link");

                if node.state == NodeState::Free {
                    assert!(!prev_free, "adjacent free intervals were not coalesced");
                    assert!(
                        self.free
                            .get(&node.size())
                            .is_some_and(|set| set.contains(&node.free_key(ptr))),
                        "free interval missing from the size index"
                    );
                    free_nodes += 1;
                    prev_free = true;
                } else {
                    allocated += 1;
                    prev_free = false;
                }

                expected_begin = node.end;
                prev = Some(ptr);
                cursor = node.next;
            }

            assert_eq!(
                expected_begin, self.layer_length,
                "layer does not span the full layer length"
            );
            assert_eq!(prev, Some(layer.tail), "stale layer tail");
        }

        let indexed: usize = self.free.values().map(BTreeSet::len).sum();
        assert_eq!(indexed, free_nodes, "size index holds stale entries");
        assert!(
            self.free.values().all(|set| !set.is_empty()),
            "size index holds an empty size class"
        );
        assert_eq!(allocated, self.live, "live interval count out of sync");

        allocated
    }

    fn reset(&mut self, length: u32, number_layers: u32) {
        assert!(length > 0, "interval allocator layers must be non-empty");
        self.nodes.clear();
        self.layers.clear();
        self.free.clear();
        self.layer_length = length;
        self.live = 0;
        for layer in 0..number_layers {
            self.add_layer(layer);
        }
    }

    fn add_layer(&mut self, layer: u32) {
        debug_assert_eq!(self.layers.len(), layer as usize, "layers are added in order");
        let ptr = self.nodes.allocate(Node {
            begin: 0,
            end: self.layer_length,
            layer,
            prev: None,
            next: None,
            state: NodeState::Free,
        });
        self.layers.push(Layer {
            head: ptr,
            tail: ptr,
        });
        self.insert_free(ptr);
    }

    fn validate(&self, id: IntervalId) {
        let Some(node) = self.nodes.get(id.node) else {
            panic!("released an interval that does not belong to this allocator");
        };
        match node.state {
            NodeState::Allocated { serial } if serial == id.serial => {}
            _ => panic!("interval released twice or after the allocator was cleared"),
        }
    }

    fn insert_free(&mut self, ptr: PoolPtr) {
        let node = &self.nodes[ptr];
        self.free
            .entry(node.size())
            .or_default()
            .insert(node.free_key(ptr));
    }

    fn remove_free(&mut self, ptr: PoolPtr) {
        let node = &self.nodes[ptr];
        let size = node.size();
        let key = node.free_key(ptr);
        if let Some(set) = self.free.get_mut(&size) {
            let removed = set.remove(&key);
            debug_assert!(removed, "free interval missing from the size index");
            if set.is_empty() {
                self.free.remove(&size);
            }
        }
    }

    /// Merge the node following `ptr` into `ptr`.
    fn absorb_next(&mut self, ptr: PoolPtr) {
        let Some(next) = self.nodes[ptr].next else {
            unreachable!("absorb_next called on a layer tail");
        };
        let Some(removed) = self.nodes.deallocate(next) else {
            unreachable!("linked node missing from the pool");
        };
        let node = &mut self.nodes[ptr];
        node.end = removed.end;
        node.next = removed.next;
        let layer = node.layer as usize;
        match removed.next {
            Some(after) => self.nodes[after].prev = Some(ptr),
            None => self.layers[layer].tail = ptr,
        }
    }
}

impl Debug for IntervalAllocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IntervalAllocator")
            .field("layer_length", &self.layer_length)
            .field("number_layers", &self.layers.len())
            .field("live", &self.live)
            .field("free_sizes", &self.free.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlaps(a: Interval, b: Interval) -> bool {
        a.layer == b.layer && a.begin < b.end && b.begin < a.end
    }

    #[test]
    fn first_allocations_pack_from_the_start() {
        let mut alloc = IntervalAllocator::new(100, 1);
        let a = alloc.allocate(10).unwrap();
        let b = alloc.allocate(20).unwrap();
        assert_eq!(alloc.interval(a).unwrap(), Interval { begin: 0, end: 10, layer: 0 });
        assert_eq!(alloc.interval(b).unwrap(), Interval { begin: 10, end: 30, layer: 0 });
        assert_eq!(alloc.check(), 2);
    }

    #[test]
    fn picks_smallest_adequate_hole() {
        let mut alloc = IntervalAllocator::new(100, 1);
        let a = alloc.allocate(30).unwrap();
        let _b = alloc.allocate(5).unwrap();
        let c = alloc.allocate(10).unwrap();
        let _d = alloc.allocate(5).unwrap();
        alloc.release(a);
        alloc.release(c);

        // Holes: [0,30), [35,45), [50,100). A request of 8 fits the 10-wide hole best.
        let e = alloc.allocate(8).unwrap();
        assert_eq!(alloc.interval(e).unwrap().begin, 35);
        assert_eq!(alloc.check(), 3);
    }

    #[test]
    fn coalesces_in_either_release_order() {
        for reverse in [false, true] {
            let mut alloc = IntervalAllocator::new(64, 1);
            let a = alloc.allocate(16).unwrap();
            let b = alloc.allocate(16).unwrap();
            let _c = alloc.allocate(32).unwrap();
            if reverse {
                alloc.release(b);
                alloc.release(a);
            } else {
                alloc.release(a);
                alloc.release(b);
            }
            assert_eq!(alloc.check(), 1);
            let merged = alloc.allocate(32).unwrap();
            assert_eq!(
                alloc.interval(merged).unwrap(),
                Interval { begin: 0, end: 32, layer: 0 },
                "released neighbours should form one 32-wide interval"
            );
        }
    }

    #[test]
    fn exhaustion_returns_none() {
        let mut alloc = IntervalAllocator::new(10, 2);
        assert!(alloc.allocate(11).is_none());
        let a = alloc.allocate(10).unwrap();
        let b = alloc.allocate(10).unwrap();
        assert_eq!(alloc.interval(a).unwrap().layer, 0);
        assert_eq!(alloc.interval(b).unwrap().layer, 1);
        assert!(alloc.allocate(1).is_none());
        assert!(alloc.allocate(0).is_none());
    }

    #[test]
    fn growth_keeps_existing_intervals() {
        let mut alloc = IntervalAllocator::new(16, 1);
        let a = alloc.allocate(10).unwrap();
        let b = alloc.allocate(6).unwrap();
        let before = (alloc.interval(a).unwrap(), alloc.interval(b).unwrap());
        assert!(alloc.allocate(4).is_none());

        alloc.set_layer_length(32);
        let c = alloc.allocate(16).unwrap();
        assert_eq!(alloc.interval(c).unwrap(), Interval { begin: 16, end: 32, layer: 0 });

        alloc.set_number_layers(3);
        let d = alloc.allocate(32).unwrap();
        assert_eq!(alloc.interval(d).unwrap().layer, 1);

        assert_eq!((alloc.interval(a).unwrap(), alloc.interval(b).unwrap()), before);
        assert_eq!(alloc.check(), 4);
    }

    #[test]
    fn lengthening_extends_a_free_tail() {
        let mut alloc = IntervalAllocator::new(16, 1);
        let _a = alloc.allocate(10).unwrap();
        alloc.set_layer_length(20);
        // The 6-wide free tail and the 4 new elements form one 10-wide interval.
        let b = alloc.allocate(10).unwrap();
        assert_eq!(alloc.interval(b).unwrap(), Interval { begin: 10, end: 20, layer: 0 });
        assert_eq!(alloc.check(), 2);
    }

    #[test]
    fn clear_resets_everything() {
        let mut alloc = IntervalAllocator::new(8, 1);
        let a = alloc.allocate(8).unwrap();
        alloc.clear(4, 2);
        assert!(!alloc.has_live_intervals());
        assert!(alloc.interval(a).is_none());
        assert_eq!(alloc.layer_length(), 4);
        assert_eq!(alloc.number_layers(), 2);
        assert_eq!(alloc.check(), 0);
    }

    #[test]
    #[should_panic(expected = "interval released twice")]
    fn double_release_panics() {
        let mut alloc = IntervalAllocator::new(8, 1);
        let a = alloc.allocate(4).unwrap();
        alloc.release(a);
        alloc.release(a);
    }

    #[test]
    #[should_panic(expected = "can only grow")]
    fn shrinking_panics() {
        let mut alloc = IntervalAllocator::new(8, 2);
        alloc.set_number_layers(1);
    }

    #[test]
    fn stress_random_alloc_release() {
        let mut alloc = IntervalAllocator::new(1000, 4);

        let a: usize = 1103515245;
        let c: usize = 12345;
        let m: usize = usize::pow(2, 31);
        let mut seed: usize = 37;
        let mut rand = || {
            seed = (a.wrapping_mul(seed).wrapping_add(c)) % m;
            seed
        };

        let mut live: Vec<IntervalId> = Vec::new();
        for step in 0..20000 {
            if rand() % 5 > 2 && !live.is_empty() {
                let nth = rand() % live.len();
                alloc.release(live.swap_remove(nth));
            } else if let Some(id) = alloc.allocate((rand() % 200) as u32 + 1) {
                live.push(id);
            }

            if step % 997 == 0 {
                assert_eq!(alloc.check(), live.len());
                let intervals: Vec<_> = live.iter().map(|id| alloc.interval(*id).unwrap()).collect();
                for (i, x) in intervals.iter().enumerate() {
                    assert!(x.end <= alloc.layer_length(), "interval past the layer end");
                    for y in &intervals[i + 1..] {
                        assert!(!overlaps(*x, *y), "{x:?} overlaps {y:?}");
                    }
                }
            }
        }

        for id in live.drain(..) {
            alloc.release(id);
        }
        assert_eq!(alloc.check(), 0);
        for _ in 0..4 {
            assert!(alloc.allocate(1000).is_some(), "every layer should be whole again");
        }
    }
}
