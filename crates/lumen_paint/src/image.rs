//! Image atlas bookkeeping
//!
//! Decoded images pack into a shared atlas texture; callers hold cheap
//! cloneable [`ImageHandle`]s. The atlas keeps weak references only, so
//! dropping the last handle releases the packed rectangle. Reclamation is
//! deferred to the atlas repack boundary, matching how the texture itself is
//! rewritten.

use std::sync::{Arc, Weak};

use rustc_hash::FxHashMap;
use tracing::debug;

use lumen_core::{Atlas, AtlasId, Bounds};

/// Caller-side handle to a packed image. The atlas entry stays alive for as
/// long as any clone of the handle does.
#[derive(Clone, Debug)]
pub struct ImageHandle {
    id: AtlasId,
    texture: u64,
    /// Refcount anchor; the atlas watches it through a `Weak`, so the field
    /// itself is never read.
    #[allow(dead_code)]
    alive: Arc<()>,
}

impl ImageHandle {
    /// Texture id to draw with, paired with [`ImageAtlas::uv`].
    pub fn texture(&self) -> u64 {
        self.texture
    }

    pub(crate) fn id(&self) -> AtlasId {
        self.id
    }
}

struct Entry {
    alive: Weak<()>,
    rect: Bounds,
}

/// Packs decoded images into one growable atlas and hands out refcounted
/// handles. Upload of the pixel data is the backend's job; this tracks
/// placement only.
pub struct ImageAtlas {
    atlas: Atlas,
    entries: FxHashMap<AtlasId, Entry>,
    texture: u64,
    /// Bumped on every repack so backends know cached uv coordinates are
    /// stale.
    generation: u64,
}

impl ImageAtlas {
    pub fn new(texture: u64, width: i32, height: i32) -> Self {
        Self {
            atlas: Atlas::new(width, height).with_padding(1),
            entries: FxHashMap::default(),
            texture,
            generation: 0,
        }
    }

    pub fn texture(&self) -> u64 {
        self.texture
    }

    pub fn width(&self) -> i32 {
        self.atlas.width()
    }

    pub fn height(&self) -> i32 {
        self.atlas.height()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Pack a `width` x `height` image and return its handle. A repack (and
    /// the dead-entry sweep that precedes it) may relocate every live entry.
    pub fn add(&mut self, width: i32, height: i32) -> ImageHandle {
        self.sweep_dead();
        let packed = self.atlas.add(width, height);
        if packed.repacked {
            self.generation += 1;
            let ids: Vec<AtlasId> = self.entries.keys().copied().collect();
            for id in ids {
                if let Some(rect) = self.atlas.rect(id) {
                    if let Some(entry) = self.entries.get_mut(&id) {
                        entry.rect = rect;
                    }
                }
            }
            debug!(
                generation = self.generation,
                width = self.atlas.width(),
                height = self.atlas.height(),
                "image atlas repacked"
            );
        }
        let alive = Arc::new(());
        let rect = self
            .atlas
            .rect(packed.id)
            .unwrap_or(Bounds::new(0, 0, width, height));
        self.entries.insert(
            packed.id,
            Entry {
                alive: Arc::downgrade(&alive),
                rect,
            },
        );
        ImageHandle {
            id: packed.id,
            texture: self.texture,
            alive,
        }
    }

    /// Pixel rectangle of a live handle inside the atlas texture.
    pub fn rect(&self, handle: &ImageHandle) -> Option<Bounds> {
        self.entries.get(&handle.id()).map(|e| e.rect)
    }

    /// Normalized (u0, v0, u1, v1) coordinates for a live handle.
    pub fn uv(&self, handle: &ImageHandle) -> Option<[f32; 4]> {
        let rect = self.rect(handle)?;
        let w = self.atlas.width() as f32;
        let h = self.atlas.height() as f32;
        Some([
            rect.x as f32 / w,
            rect.y as f32 / h,
            rect.right() as f32 / w,
            rect.bottom() as f32 / h,
        ])
    }

    pub fn live_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.alive.strong_count() > 0)
            .count()
    }

    // Entries whose last handle dropped free their rect here, right before
    // the packer runs.
    fn sweep_dead(&mut self) {
        let dead: Vec<AtlasId> = self
            .entries
            .iter()
            .filter(|(_, e)| e.alive.strong_count() == 0)
            .map(|(&id, _)| id)
            .collect();
        for id in dead {
            self.atlas.remove(id);
            self.entries.remove(&id);
        }
    }
}
