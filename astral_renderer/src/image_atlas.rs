// Copyright 2026 the Astral Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Images stored as power-of-two tiles of an array texture.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::{Ref, RefCell};
use core::fmt::{Debug, Formatter};

use peniko::color::Rgba8;
use smallvec::SmallVec;

use astral_alloc::{MAX_LOG2_TILE_SIZE, Region, TileAllocator};

use crate::lock::{ReleaseStorage, ResourceLock};
use crate::{AtlasConfig, AtlasStats, Error, ImageBacking, LockResources};

/// Where one piece of an image lives in the backing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageTile {
    /// Layer of the backing.
    pub layer: u32,
    /// Top-left corner of the piece within the layer.
    pub origin: (u32, u32),
    /// Top-left corner of the piece within the image.
    pub offset: (u32, u32),
    /// Size of the piece.
    pub size: (u32, u32),
}

struct ImageStore {
    tiles: TileAllocator,
    lock: ResourceLock<Region>,
    live_regions: usize,
}

impl ImageStore {
    fn release_region(&mut self, region: Region) {
        if let Some(region) = self.lock.defer(region) {
            self.tiles.release_region(region);
            self.live_regions -= 1;
        }
    }

    fn unlock(&mut self) {
        for region in self.lock.unlock() {
            self.tiles.release_region(region);
            self.live_regions -= 1;
        }
    }
}

impl ReleaseStorage<Region> for RefCell<ImageStore> {
    fn release_storage(&self, key: Region) {
        self.borrow_mut().release_region(key);
    }
}

struct ImageInner {
    owner: Rc<dyn ReleaseStorage<Region>>,
    region: Option<Region>,
    size: (u32, u32),
    tiles: SmallVec<[ImageTile; 4]>,
}

impl Drop for ImageInner {
    fn drop(&mut self) {
        if let Some(region) = self.region.take() {
            self.owner.release_storage(region);
        }
    }
}

/// A shared handle to an image in an [`ImageAtlas`].
#[derive(Clone)]
pub struct Image {
    inner: Rc<ImageInner>,
}

impl Image {
    /// `(width, height)` of the image.
    #[inline]
    pub fn size(&self) -> (u32, u32) {
        self.inner.size
    }

    /// The pieces of the image; together they cover it exactly.
    #[inline]
    pub fn tiles(&self) -> &[ImageTile] {
        &self.inner.tiles
    }
}

impl Debug for Image {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Image")
            .field("size", &self.inner.size)
            .field("tiles", &self.inner.tiles)
            .finish_non_exhaustive()
    }
}

/// Atlas of [`Image`]s in an array texture that grows in layers.
pub struct ImageAtlas<B: ImageBacking> {
    backing: RefCell<B>,
    store: Rc<RefCell<ImageStore>>,
    growth_layers: u32,
    /// Scratch space for the pixels of one tile.
    scratch: RefCell<Vec<Rgba8>>,
}

impl<B: ImageBacking> ImageAtlas<B> {
    /// Creates an atlas over `backing` with the default configuration.
    ///
    /// # Panics
    ///
    /// Panics if the backing's layers are empty.
    pub fn new(backing: B) -> Self {
        Self::with_config(backing, AtlasConfig::default())
    }

    /// Creates an atlas over `backing`.
    ///
    /// The largest tile is [`AtlasConfig::image_log2_max_tile_size`], shrunk
    /// to fit a layer and to [`MAX_LOG2_TILE_SIZE`]; each layer holds as many
    /// of them as fit.
    ///
    /// # Panics
    ///
    /// Panics if the backing's layers are empty.
    pub fn with_config(backing: B, config: AtlasConfig) -> Self {
        let (width, height) = backing.layer_size();
        assert!(width > 0 && height > 0, "image backing layers must not be empty");
        let log2_max = (
            config
                .image_log2_max_tile_size
                .0
                .min(width.ilog2())
                .min(MAX_LOG2_TILE_SIZE),
            config
                .image_log2_max_tile_size
                .1
                .min(height.ilog2())
                .min(MAX_LOG2_TILE_SIZE),
        );
        let mut tiles = TileAllocator::new(
            log2_max,
            (width >> log2_max.0, height >> log2_max.1),
            backing.number_layers(),
        );
        tiles.set_tracer(config.tracer);
        Self {
            backing: RefCell::new(backing),
            store: Rc::new(RefCell::new(ImageStore {
                tiles,
                lock: ResourceLock::new(),
                live_regions: 0,
            })),
            growth_layers: config.image_growth_layers.max(1),
            scratch: RefCell::new(Vec::new()),
        }
    }

    /// Largest image the atlas accepts.
    pub fn max_image_size(&self) -> (u32, u32) {
        self.store.borrow().tiles.max_tile_size()
    }

    /// Store a `width × height` image of row-major `pixels`.
    ///
    /// Fails if the image is empty or larger than
    /// [`max_image_size`](Self::max_image_size).
    ///
    /// # Panics
    ///
    /// Panics if `pixels` does not hold exactly `width × height` pixels.
    pub fn create_image(&self, width: u32, height: u32, pixels: &[Rgba8]) -> Result<Image, Error> {
        assert_eq!(
            pixels.len() as u64,
            u64::from(width) * u64::from(height),
            "pixel count does not match a {width}x{height} image"
        );
        let region = self.allocate_region(width, height)?;

        let store = self.store.borrow();
        let mut backing = self.backing.borrow_mut();
        let mut scratch = self.scratch.take();
        let mut placed: SmallVec<[ImageTile; 4]> = SmallVec::new();
        for part in region.tiles() {
            let Some(tile) = store.tiles.tile(part.tile) else {
                unreachable!("region tiles are live");
            };
            scratch.clear();
            for row in part.offset.1..part.offset.1 + part.size.1 {
                let start = (row * width + part.offset.0) as usize;
                scratch.extend_from_slice(&pixels[start..start + part.size.0 as usize]);
            }
            backing.upload(tile.layer, (tile.x, tile.y), part.size, &scratch);
            placed.push(ImageTile {
                layer: tile.layer,
                origin: (tile.x, tile.y),
                offset: part.offset,
                size: part.size,
            });
        }
        self.scratch.replace(scratch);
        drop(backing);
        drop(store);

        Ok(Image {
            inner: Rc::new(ImageInner {
                owner: self.store.clone(),
                region: Some(region),
                size: (width, height),
                tiles: placed,
            }),
        })
    }

    /// The backing store.
    ///
    /// Creating images while the borrow is held panics; dropping handles
    /// does not.
    pub fn backing(&self) -> Ref<'_, B> {
        self.backing.borrow()
    }

    /// Current bookkeeping figures.
    pub fn stats(&self) -> AtlasStats {
        let store = self.store.borrow();
        AtlasStats {
            live_allocations: store.live_regions,
            delayed_frees: store.lock.number_delayed(),
            lock_depth: store.lock.depth(),
            backing_size: self.backing.borrow().number_layers(),
        }
    }

    fn allocate_region(&self, width: u32, height: u32) -> Result<Region, Error> {
        let mut store = self.store.borrow_mut();
        loop {
            if let Some(region) = store.tiles.allocate_region(width, height)? {
                store.live_regions += 1;
                return Ok(region);
            }

            let current = store.tiles.number_layers();
            let requested = current
                .saturating_mul(2)
                .max(current.saturating_add(self.growth_layers));
            let actual = self.backing.borrow_mut().resize(requested);
            assert!(
                actual >= requested,
                "image backing grew to {actual} layers, {requested} were requested"
            );
            log::debug!("image backing grown from {current} to {actual} layers");
            store.tiles.set_number_layers(actual);
        }
    }
}

impl<B: ImageBacking> LockResources for ImageAtlas<B> {
    fn lock_resources(&self) {
        self.store.borrow_mut().lock.lock();
    }

    fn unlock_resources(&self) {
        self.store.borrow_mut().unlock();
    }
}

impl<B: ImageBacking> Debug for ImageAtlas<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ImageAtlas")
            .field("layer_size", &self.backing.borrow().layer_size())
            .field("tiles", &self.store.borrow().tiles)
            .finish_non_exhaustive()
    }
}
