// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shadow map placement and generational ids.

use astral_renderer::{ErrorKind, LockResources, ShadowMapAtlas, ShadowMapSide};
use peniko::kurbo::Point;

use crate::util::DepthTexture;

const LIGHT: Point = Point::new(10.0, 20.0);

#[test]
fn shadow_map_sides_use_four_rows() {
    let atlas = ShadowMapAtlas::new(DepthTexture::new(64, 0));
    let map = atlas.create(32, LIGHT).unwrap();

    assert_eq!(atlas.backing().resizes, [4]);
    assert_eq!(map.dimensions(), 32);
    assert_eq!(map.light_position(), LIGHT);
    let rows: Vec<_> = ShadowMapSide::ALL.iter().map(|&side| map.location(side)).collect();
    assert_eq!(rows, [(0, 0), (0, 1), (0, 2), (0, 3)]);
}

#[test]
fn shadow_map_packing_and_growth() {
    let atlas = ShadowMapAtlas::new(DepthTexture::new(64, 4));
    let a = atlas.create(32, LIGHT).unwrap();
    let b = atlas.create(32, LIGHT).unwrap();
    let c = atlas.create(16, LIGHT).unwrap();

    assert_eq!(a.location(ShadowMapSide::MinX), (0, 0));
    assert_eq!(b.location(ShadowMapSide::MinX), (32, 0));
    assert_eq!(c.location(ShadowMapSide::MaxY), (0, 7));
    assert_eq!(atlas.backing().resizes, [8]);
    assert_eq!(atlas.stats().backing_size, 8);
}

#[test]
fn shadow_map_too_large() {
    let atlas = ShadowMapAtlas::new(DepthTexture::new(64, 4));
    let err = atlas.create(65, LIGHT).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ShadowMapTooLarge);
    assert_eq!(err.requested(), 65);
    assert_eq!(err.limit(), 64);
    assert_eq!(atlas.stats().live_allocations, 0);
}

#[test]
#[should_panic(expected = "non-zero dimension")]
fn shadow_map_zero_dimension_panics() {
    let atlas = ShadowMapAtlas::new(DepthTexture::new(64, 4));
    let _ = atlas.create(0, LIGHT);
}

#[test]
fn shadow_map_id_is_generational() {
    let atlas = ShadowMapAtlas::new(DepthTexture::new(64, 4));
    let map = atlas.create(16, LIGHT).unwrap();
    let old_id = map.id();

    let fetched = atlas.fetch_shadow_map(old_id).unwrap();
    assert_eq!(fetched.id(), old_id);
    assert_eq!(fetched.location(ShadowMapSide::MinY), map.location(ShadowMapSide::MinY));
    drop(fetched);
    drop(map);
    assert!(atlas.fetch_shadow_map(old_id).is_none());

    let reused = atlas.create(16, LIGHT).unwrap();
    assert_eq!(reused.id().slot(), old_id.slot());
    assert_eq!(reused.id().uniqueness(), old_id.uniqueness() + 1);
    assert!(atlas.fetch_shadow_map(old_id).is_none());
    assert_eq!(atlas.fetch_shadow_map(reused.id()).unwrap().id(), reused.id());
}

#[test]
fn shadow_map_id_retired_while_storage_is_deferred() {
    let atlas = ShadowMapAtlas::new(DepthTexture::new(16, 4));
    let map = atlas.create(16, LIGHT).unwrap();
    let id = map.id();

    atlas.lock_resources();
    drop(map);
    assert!(atlas.fetch_shadow_map(id).is_none());
    let stats = atlas.stats();
    assert_eq!(stats.delayed_frees, 1);
    assert_eq!(stats.live_allocations, 1);

    let next = atlas.create(16, LIGHT).unwrap();
    assert_eq!(next.location(ShadowMapSide::MinX), (0, 4));
    atlas.unlock_resources();
    assert_eq!(atlas.stats().live_allocations, 1);

    let again = atlas.create(16, LIGHT).unwrap();
    assert_eq!(again.location(ShadowMapSide::MinX), (0, 0));
}

#[test]
fn shadow_map_in_use_until_unlocked() {
    let atlas = ShadowMapAtlas::new(DepthTexture::new(64, 4));
    let map = atlas.create(8, LIGHT).unwrap();
    assert!(!map.in_use());

    atlas.lock_resources();
    map.mark_in_use();
    assert!(map.in_use());
    atlas.lock_resources();
    atlas.unlock_resources();
    assert!(map.in_use(), "nested unlock keeps the frame open");
    atlas.unlock_resources();
    assert!(!map.in_use());
    assert_eq!(atlas.unlock_count(), 1);
}

#[test]
fn shadow_map_offscreen_render_index() {
    let atlas = ShadowMapAtlas::new(DepthTexture::new(64, 4));
    let map = atlas.create(8, LIGHT).unwrap();
    assert_eq!(map.offscreen_render_index(), None);

    atlas.set_offscreen_render_index(&map, Some(3));
    assert_eq!(map.clone().offscreen_render_index(), Some(3));
    atlas.set_offscreen_render_index(&map, None);
    assert_eq!(map.offscreen_render_index(), None);
}

#[test]
#[should_panic(expected = "belongs to a different atlas")]
fn shadow_map_offscreen_index_from_another_atlas_panics() {
    let atlas = ShadowMapAtlas::new(DepthTexture::new(64, 4));
    let other = ShadowMapAtlas::new(DepthTexture::new(64, 4));
    let map = atlas.create(8, LIGHT).unwrap();
    other.set_offscreen_render_index(&map, Some(0));
}

#[test]
fn shadow_map_render_target() {
    let atlas = ShadowMapAtlas::new(DepthTexture::new(64, 4));
    assert_eq!(*atlas.render_target(), "shadow depth");
}

#[test]
fn shadow_map_release_while_backing_is_borrowed() {
    let atlas = ShadowMapAtlas::new(DepthTexture::new(64, 4));
    let map = atlas.create(16, LIGHT).unwrap();
    let id = map.id();
    let target = atlas.render_target();
    drop(map);
    assert_eq!(*target, "shadow depth");
    drop(target);
    assert!(atlas.fetch_shadow_map(id).is_none());
    assert_eq!(atlas.stats().live_allocations, 0);
}
